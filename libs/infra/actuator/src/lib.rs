pub mod actuator;
pub mod lines;

pub use actuator::{Actuator, ButtonCallback};
pub use lines::{CdevLines, GpioError, GpioLines, MockLines};
