pub mod classify;
pub mod doctor;
pub mod onboard;
pub mod run;
