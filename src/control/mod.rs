// Control plane shared between the command server and the sensing loop:
// atomic intent flags plus the physical-button debouncer.

pub mod state;
pub mod debounce;
