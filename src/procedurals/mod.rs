pub mod sphereflake;
pub mod read;
