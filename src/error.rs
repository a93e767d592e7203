use core::fmt::{Debug, Display, Formatter};

/// Which edge of the acknowledge handshake was missed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWait {
    /// Acknowledge did not assert after the strobe went low
    Assert,
    /// Acknowledge did not release after the strobe went high
    Release,
}

/// Epd error type
///
/// `E` is the error of the board's [`ApolloBus`](crate::bus::ApolloBus)
/// implementation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind<E> {
    /// Encountered an error on the pin/port layer
    Bus(E),

    /// The controller missed an acknowledge deadline.
    ///
    /// Recoverable in principle; see [`AckPolicy`](crate::AckPolicy) for what
    /// happens to the rest of the sequence.
    AckTimeout(AckWait),

    /// The display-size probe answered with an unexpected byte, so there is
    /// no (functioning) Apollo controller on the bus. Fatal to bring-up.
    ControllerNotDetected {
        /// The byte actually read back
        status: u8,
    },

    /// An attribute write was outside the accepted bounds; state is unchanged
    InvalidRange,
}

impl<E> From<E> for ErrorKind<E> {
    fn from(bus: E) -> Self {
        ErrorKind::Bus(bus)
    }
}

impl<E: Debug> Debug for ErrorKind<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "Bus({err:?})"),
            Self::AckTimeout(edge) => write!(f, "AckTimeout({edge:?})"),
            Self::ControllerNotDetected { status } => {
                write!(f, "ControllerNotDetected {{ status: {status:#04x} }}")
            }
            Self::InvalidRange => write!(f, "InvalidRange"),
        }
    }
}

impl<E: Display> Display for ErrorKind<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(err) => Display::fmt(&err, f),
            Self::AckTimeout(AckWait::Assert) => write!(f, "timeout waiting for acknowledge"),
            Self::AckTimeout(AckWait::Release) => {
                write!(f, "timeout waiting for acknowledge to clear")
            }
            Self::ControllerNotDetected { status } => {
                write!(f, "controller not detected (read {status:#04x})")
            }
            Self::InvalidRange => write!(f, "value out of range"),
        }
    }
}
