bitflags::bitflags! {
    /// Which structural chunks have been seen so far.
    ///
    /// Flags are only ever added during one decode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct DecodePosition: u8 {
        const HEADER = 0x01;
        const PALETTE = 0x02;
        const DATA_STARTED = 0x04;
        const DATA_FINISHED = 0x08;
        const END = 0x10;
    }
}

impl DecodePosition {
    /// The decode reached its terminal state.
    pub(crate) fn is_complete(self) -> bool {
        self.contains(DecodePosition::END | DecodePosition::DATA_FINISHED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_needs_end_and_data() {
        let mut position = DecodePosition::default();
        assert!(position.is_empty());
        position |= DecodePosition::HEADER | DecodePosition::END;
        assert!(!position.is_complete());
        position |= DecodePosition::DATA_FINISHED;
        assert!(position.is_complete());
    }
}
