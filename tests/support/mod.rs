#![allow(dead_code)]

pub mod voice_env;
pub mod wav;
