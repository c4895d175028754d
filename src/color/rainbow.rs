use super::Color;

/// Width of one of the three hue bands.
const BAND: u8 = 255 / 3;

/// Maps a phase in `0..=255` onto a green, red, blue, green color wheel.
///
/// Channel arithmetic is wrapping `u8` arithmetic.
pub fn rainbow(n: u8) -> Color {
    if n < BAND {
        let up = n.wrapping_mul(3);
        Color::new(up, 255u8.wrapping_sub(up), 0)
    } else if n < BAND * 2 {
        let up = (n - BAND).wrapping_mul(3);
        Color::new(255u8.wrapping_sub(up), 0, up)
    } else {
        let up = (n - BAND * 2).wrapping_mul(3);
        Color::new(0, up, 255u8.wrapping_sub(up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(n: u8) -> (u8, u8, u8) {
        let n = n as u32;
        let wrap = |v: i64| v.rem_euclid(256) as u8;

        if n < 85 {
            (wrap(n as i64 * 3), wrap(255 - n as i64 * 3), 0)
        } else if n < 170 {
            let n = n as i64 - 85;
            (wrap(255 - n * 3), 0, wrap(n * 3))
        } else {
            let n = n as i64 - 170;
            (0, wrap(n * 3), wrap(255 - n * 3))
        }
    }

    #[test]
    fn matches_reference_for_every_phase() {
        for n in 0..=255u8 {
            let color = rainbow(n);
            assert_eq!((color.r, color.g, color.b), reference(n), "phase {}", n);
        }
    }

    #[test]
    fn bands_partition_at_85_and_170() {
        for n in 0..=255u8 {
            let color = rainbow(n);
            match n {
                0..=84 => {
                    assert_eq!(color.b, 0, "phase {}", n);
                    assert_eq!(color.r as u16 + color.g as u16, 255, "phase {}", n);
                }
                85..=169 => {
                    assert_eq!(color.g, 0, "phase {}", n);
                    assert_eq!(color.r as u16 + color.b as u16, 255, "phase {}", n);
                }
                _ => {
                    assert_eq!(color.r, 0, "phase {}", n);
                    assert_eq!(color.g as u16 + color.b as u16, 255, "phase {}", n);
                }
            }
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(rainbow(0), Color::new(0, 255, 0));
        assert_eq!(rainbow(84), Color::new(252, 3, 0));
        assert_eq!(rainbow(85), Color::new(255, 0, 0));
        assert_eq!(rainbow(169), Color::new(3, 0, 252));
        assert_eq!(rainbow(170), Color::new(0, 0, 255));
        assert_eq!(rainbow(255), Color::new(0, 255, 0));
    }
}
