//! Typing-keyboard layout: two piano-style rows around middle C.
//!
//! Home row = white keys, the row above = black keys, mirroring the octave
//! layout every tracker and DAW uses:
//!
//!     w e   t y u   o
//!    a s d f g h j k l
//!    C D E F G A B C D  (octave 4 → 5)

use keytone::tuning::PitchId;

pub fn pitch_for(key: char) -> Option<PitchId> {
    let pitch = match key {
        'a' => 60, // C4
        'w' => 61,
        's' => 62,
        'e' => 63,
        'd' => 64,
        'f' => 65,
        't' => 66,
        'g' => 67,
        'y' => 68,
        'h' => 69, // A4
        'u' => 70,
        'j' => 71,
        'k' => 72, // C5
        'o' => 73,
        'l' => 74,
        _ => return None,
    };
    Some(pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_row_is_the_white_keys() {
        assert_eq!(pitch_for('a'), Some(60));
        assert_eq!(pitch_for('h'), Some(69));
        assert_eq!(pitch_for('k'), Some(72));
        assert_eq!(pitch_for('z'), None);
    }
}
