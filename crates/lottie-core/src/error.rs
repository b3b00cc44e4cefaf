use thiserror::Error;

#[derive(Error, Debug)]
pub enum LottieError {
    #[error("Frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f32),
    #[error("Playback speed must be positive and finite, got {0}")]
    InvalidSpeed(f32),
    #[error("Clock has been disposed")]
    Disposed,
    #[error("Failed to start frame scheduler")]
    Scheduler(#[from] std::io::Error),
}
