use serde::Deserialize;

pub mod avatar;
pub mod student;

pub type StudentId = i64;

#[derive(Deserialize)]
pub struct IdForm {
    pub id: StudentId,
}
