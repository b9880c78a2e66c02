//! Tutor Assist: a multi-channel tutoring chatbot that collects a short
//! student profile per session and answers questions at the student's level.

pub mod agent;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod profile;
pub mod session;
pub mod tutor;
