#![allow(dead_code)]

pub mod clip_site;
