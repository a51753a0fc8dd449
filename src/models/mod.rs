// Data models for the Journal API

pub mod post;
