pub mod recording;
pub mod capturing;
