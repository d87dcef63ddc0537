//! Actions passed from components to the application loop

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Animation tick
    Tick,
    /// Terminal resized
    Resize(u16, u16),
    /// Start configuration generation
    GenConfig,
    Quit,
}
