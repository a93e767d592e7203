//! Bus commands of the Apollo e-ink controller

use crate::traits;

/// Apollo command set.
///
/// Should rarely (never?) be needed directly. No public datasheet exists;
/// the opcodes come from the vendor drivers shipped with the EB600 and
/// lBook V3 readers.
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum Command {
    WriteToFlash = 0x01,
    ReadFromFlash = 0x02,
    WriteRegister = 0x10,
    ReadRegister = 0x11,
    ReadTemperature = 0x21,
    /// Start of a full-frame pixel stream, ended by `StopLoading`
    LoadPicture = 0xA0,
    StopLoading = 0xA1,
    DisplayPicture = 0xA2,
    /// One data byte: 0x01 clears to white
    EraseDisplay = 0xA3,
    InitDisplay = 0xA4,
    RestoreImage = 0xA5,
    GetStatus = 0xAA,
    /// Followed by 8 coordinate bytes (x1, y1, x2, y2 big-endian 16 bit)
    /// and the sub-rectangle pixel stream
    LoadPartialPicture = 0xB0,
    DisplayPartialPicture = 0xB1,
    VersionNumber = 0xE0,
    DisplaySize = 0xE2,
    Reset = 0xEE,
    NormalMode = 0xF0,
    SleepMode = 0xF1,
    StandbyMode = 0xF2,
    /// One data byte: 0x00 for 1 bpp, 0x02 for 2 bpp
    SetDepth = 0xF3,
    /// One data byte: quadrant code, see `DisplayRotation`
    Orientation = 0xF5,
    PositivePicture = 0xF7,
    NegativePicture = 0xF8,
    AutoRefresh = 0xF9,
    CancelAutoRefresh = 0xFA,
    SetRefreshTimer = 0xFB,
    ManualRefresh = 0xFC,
    ReadRefreshTimer = 0xFD,
}

impl traits::Command for Command {
    /// Returns the address of the command
    fn address(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::Command;
    use crate::traits::Command as CommandTrait;

    #[test]
    fn command_addr() {
        assert_eq!(Command::LoadPicture.address(), 0xA0);
        assert_eq!(Command::LoadPartialPicture.address(), 0xB0);
        assert_eq!(Command::NormalMode.address(), 0xF0);
    }
}
