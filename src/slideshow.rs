//! Slideshow spec builder.
//!
//! Produces the text format consumed by the external `dvd-slideshow`
//! encoder: one colon-joined entry per line, empty fields omitted, with a
//! trailing newline. The rendering is the literal input contract of the
//! encoder, so it must stay byte-exact.

use std::fmt;
use std::path::PathBuf;

use rand::Rng;

/// Visual effect placed between two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    FadeIn,
    FadeOut,
    CrossFade,
    Wipe,
}

impl TransitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FadeIn => "fadein",
            Self::FadeOut => "fadeout",
            Self::CrossFade => "crossfade",
            Self::Wipe => "wipe",
        }
    }
}

/// Direction operand for the `wipe` effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl WipeDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// One line of the slideshow spec.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideshowEntry {
    /// `path:duration[:subtitle]`
    Image {
        path: PathBuf,
        duration: u32,
        subtitle: String,
    },
    /// `name:duration[:subtitle][:direction]`
    Transition {
        kind: TransitionKind,
        duration: u32,
        subtitle: String,
        direction: Option<WipeDirection>,
    },
}

impl SlideshowEntry {
    pub fn image(path: impl Into<PathBuf>, duration: u32) -> Self {
        Self::Image {
            path: path.into(),
            duration,
            subtitle: String::new(),
        }
    }

    pub fn transition(kind: TransitionKind, duration: u32) -> Self {
        Self::Transition {
            kind,
            duration,
            subtitle: String::new(),
            direction: None,
        }
    }

    pub fn wipe(duration: u32, direction: Option<WipeDirection>) -> Self {
        Self::Transition {
            kind: TransitionKind::Wipe,
            duration,
            subtitle: String::new(),
            direction,
        }
    }
}

impl fmt::Display for SlideshowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image {
                path,
                duration,
                subtitle,
            } => {
                write!(f, "{}:{duration}", path.display())?;
                if !subtitle.is_empty() {
                    write!(f, ":{subtitle}")?;
                }
                Ok(())
            }
            Self::Transition {
                kind,
                duration,
                subtitle,
                direction,
            } => {
                write!(f, "{}:{duration}", kind.as_str())?;
                if !subtitle.is_empty() {
                    write!(f, ":{subtitle}")?;
                }
                if let Some(d) = direction {
                    write!(f, ":{}", d.as_str())?;
                }
                Ok(())
            }
        }
    }
}

/// Builds the entry sequence for one run.
///
/// Every image except the last is followed by a uniformly random transition:
/// a fade-out/fade-in pair at half duration each, a crossfade, or a wipe.
/// The last image is followed by a single full-duration fade-out.
///
/// Deterministic for a seeded `rng`; an empty image list yields an empty
/// sequence.
pub fn build<R: Rng>(
    images: &[PathBuf],
    image_duration: u32,
    transition_duration: u32,
    rng: &mut R,
) -> Vec<SlideshowEntry> {
    let Some((last, rest)) = images.split_last() else {
        return Vec::new();
    };

    let mut entries = Vec::with_capacity(images.len() * 2);

    for image in rest {
        entries.push(SlideshowEntry::image(image, image_duration));
        match rng.gen_range(0..3) {
            0 => {
                entries.push(SlideshowEntry::transition(
                    TransitionKind::FadeOut,
                    transition_duration / 2,
                ));
                entries.push(SlideshowEntry::transition(
                    TransitionKind::FadeIn,
                    transition_duration / 2,
                ));
            }
            1 => entries.push(SlideshowEntry::transition(
                TransitionKind::CrossFade,
                transition_duration,
            )),
            _ => entries.push(SlideshowEntry::wipe(transition_duration, None)),
        }
    }

    entries.push(SlideshowEntry::image(last, image_duration));
    entries.push(SlideshowEntry::transition(
        TransitionKind::FadeOut,
        transition_duration,
    ));

    entries
}

/// Renders entries into the encoder's text format, one per line with a
/// trailing newline.
pub fn render(entries: &[SlideshowEntry]) -> String {
    let mut out = entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Convenience for callers that only need the serialized form.
pub fn build_spec<R: Rng>(
    images: &[PathBuf],
    image_duration: u32,
    transition_duration: u32,
    rng: &mut R,
) -> String {
    render(&build(images, image_duration, transition_duration, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn entries_render_exactly() {
        let entries = vec![
            SlideshowEntry::Image {
                path: PathBuf::from("img1.png"),
                duration: 5,
                subtitle: "sub1".into(),
            },
            SlideshowEntry::transition(TransitionKind::CrossFade, 10),
            SlideshowEntry::Image {
                path: PathBuf::from("img2.png"),
                duration: 10,
                subtitle: "sub2".into(),
            },
            SlideshowEntry::wipe(10, Some(WipeDirection::Left)),
        ];

        let expected = "img1.png:5:sub1\ncrossfade:10\nimg2.png:10:sub2\nwipe:10:left\n";
        assert_eq!(render(&entries), expected);
    }

    #[test]
    fn subtitle_before_direction() {
        let entry = SlideshowEntry::Transition {
            kind: TransitionKind::Wipe,
            duration: 4,
            subtitle: "caption".into(),
            direction: Some(WipeDirection::Up),
        };
        assert_eq!(entry.to_string(), "wipe:4:caption:up");
    }

    #[test]
    fn empty_subtitle_is_dropped_not_left_empty() {
        assert_eq!(
            SlideshowEntry::image("a.png", 3).to_string(),
            "a.png:3",
            "no trailing colon for an empty subtitle"
        );
        assert_eq!(
            SlideshowEntry::transition(TransitionKind::FadeOut, 2).to_string(),
            "fadeout:2"
        );
    }

    #[test]
    fn build_shapes_the_sequence() {
        let images = paths(&["a.png", "b.png", "c.png", "d.png", "e.png"]);
        let mut rng = StdRng::seed_from_u64(7);
        let entries = build(&images, 3, 2, &mut rng);

        let image_count = entries
            .iter()
            .filter(|e| matches!(e, SlideshowEntry::Image { .. }))
            .count();
        let transition_count = entries
            .iter()
            .filter(|e| matches!(e, SlideshowEntry::Transition { .. }))
            .count();

        assert_eq!(image_count, images.len());
        // Every image is followed by at least one transition; the fade
        // pair choice contributes two entries.
        assert!(transition_count >= images.len());

        assert_eq!(
            entries.last().unwrap(),
            &SlideshowEntry::transition(TransitionKind::FadeOut, 2),
            "trailing entry is a full-duration fade-out"
        );
        assert!(matches!(entries[0], SlideshowEntry::Image { .. }));
    }

    #[test]
    fn single_image_gets_only_the_trailing_fadeout() {
        let images = paths(&["only.png"]);
        let mut rng = StdRng::seed_from_u64(0);
        let entries = build(&images, 15, 2, &mut rng);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SlideshowEntry::image("only.png", 15));
        assert_eq!(
            entries[1],
            SlideshowEntry::transition(TransitionKind::FadeOut, 2)
        );
    }

    #[test]
    fn empty_image_list_builds_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(build(&[], 3, 2, &mut rng).is_empty());
    }

    #[test]
    fn fade_pair_halves_the_standard_duration() {
        // Probe many seeds until a fade pair shows up, then check the halves.
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let entries = build(&paths(&["a.png", "b.png"]), 3, 2, &mut rng);
            if let [_, SlideshowEntry::Transition {
                kind: TransitionKind::FadeOut,
                duration,
                ..
            }, SlideshowEntry::Transition {
                kind: TransitionKind::FadeIn,
                duration: d2,
                ..
            }, ..] = entries.as_slice()
            {
                assert_eq!(*duration, 1);
                assert_eq!(*d2, 1);
                return;
            }
        }
        panic!("no seed in 0..64 produced a fade pair");
    }

    #[test]
    fn seeded_builds_are_reproducible() {
        let images = paths(&["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"]);

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = build(&images, 3, 2, &mut rng_a);
        let b = build(&images, 3, 2, &mut rng_b);

        assert_eq!(a, b);
        assert_eq!(render(&a), render(&b));
    }

    #[test]
    fn rendered_lines_have_no_leading_or_trailing_colon() {
        let images = paths(&["a.png", "b.png", "c.png", "d.png"]);
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let spec = build_spec(&images, 3, 2, &mut rng);
            assert!(spec.ends_with('\n'));
            for line in spec.lines() {
                assert!(!line.is_empty());
                assert!(!line.starts_with(':'), "leading colon in {line:?}");
                assert!(!line.ends_with(':'), "trailing colon in {line:?}");
            }
        }
    }
}
