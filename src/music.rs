//! Background-track selection for slideshow runs.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::debug;

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "mid", "wav", "ogg", "aac"];

/// Picks a random audio file from `dir`.
///
/// Returns `None` when the folder is missing, unreadable, or holds no
/// recognized audio files; the slideshow is then encoded without music.
pub fn pick_random(dir: &Path) -> Option<PathBuf> {
    let tracks = audio_files(dir);
    let picked = tracks.choose(&mut rand::thread_rng()).cloned();
    if let Some(ref track) = picked {
        debug!("picked background track: {}", track.display());
    }
    picked
}

fn audio_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    AUDIO_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn picks_only_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "track.mp3");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cover.png");

        for _ in 0..10 {
            let picked = pick_random(dir.path()).unwrap();
            assert_eq!(picked.file_name().unwrap(), "track.mp3");
        }
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "LOUD.MP3");

        assert!(pick_random(dir.path()).is_some());
    }

    #[test]
    fn empty_or_missing_folder_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pick_random(dir.path()).is_none());
        assert!(pick_random(Path::new("/nonexistent/music")).is_none());
    }
}
