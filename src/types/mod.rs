//! Value types for device commands.

mod color;
mod function;
mod mode;
mod power;
mod speed;

pub use color::Color;
pub use function::Function;
pub use mode::Mode;
pub use power::PowerState;
pub use speed::Speed;
