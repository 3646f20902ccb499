pub mod myfreecams;
pub mod streamate;
