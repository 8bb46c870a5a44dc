//! Overlay controls: the state toggle, the music toggle, and photo upload.
//!
//! The controller is UI-agnostic. The egui panel, the keyboard shortcuts and
//! drag-and-drop all funnel into the same three operations.

use std::path::{Path, PathBuf};

use crate::audio::Playback;
use crate::scene::Scene;
use crate::state::TreeState;

/// Label of the primary button for the current state.
pub fn toggle_label(state: TreeState) -> &'static str {
    match state {
        TreeState::Chaos => "Assemble The Tree",
        TreeState::Formed => "Unleash Chaos",
    }
}

/// Tooltip of the music button.
pub fn music_label(playing: bool) -> &'static str {
    if playing {
        "Pause Music"
    } else {
        "Play Music"
    }
}

/// `file://` URI for a local path. Relative paths resolve against the
/// working directory.
pub fn file_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|d| d.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{}", text)
    } else {
        format!("file:///{}", text)
    }
}

/// Image extensions offered by the picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Something the user asked for through a button or a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    ToggleState,
    ToggleMusic,
    PickPhotos,
}

/// Open the native multi-select image picker. Cancelling yields nothing.
pub fn pick_photos() -> Vec<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Choose photos for the tree")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_files()
        .unwrap_or_default()
}

/// Whether a dropped file looks like an image we can show.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub struct Overlay {
    music: Box<dyn Playback>,
}

impl Overlay {
    pub fn new(music: Box<dyn Playback>) -> Self {
        Self { music }
    }

    /// Flip the tree state. Also tries to start the music if it is not
    /// already playing; a failure leaves it off.
    pub fn toggle(&mut self, scene: &mut Scene) -> TreeState {
        let next = scene.toggle_state();
        if !scene.store().music_playing() {
            self.start_music(scene);
        }
        next
    }

    /// Play or pause. Returns the new playing flag.
    pub fn toggle_music(&mut self, scene: &mut Scene) -> bool {
        if scene.store().music_playing() {
            self.music.pause();
            scene.set_music_playing(false);
        } else {
            self.start_music(scene);
        }
        scene.store().music_playing()
    }

    /// Replace the user images with the given files, in order, and show
    /// the tree. An empty selection changes nothing.
    pub fn upload<I, P>(&mut self, scene: &mut Scene, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let uris: Vec<String> = paths.into_iter().map(|p| file_uri(&p.into())).collect();
        self.show_images(scene, uris)
    }

    /// Replace the user images with already-resolved URIs, in order, and
    /// show the tree. An empty list changes nothing.
    pub fn show_images(&mut self, scene: &mut Scene, uris: Vec<String>) -> usize {
        if uris.is_empty() {
            return 0;
        }
        let count = uris.len();
        scene.set_user_images(uris);
        if scene.state() == TreeState::Chaos {
            scene.set_state(TreeState::Formed);
        }
        count
    }

    /// Run an action. The picker blocks until the dialog closes.
    pub fn apply(&mut self, action: OverlayAction, scene: &mut Scene) {
        match action {
            OverlayAction::ToggleState => {
                let state = self.toggle(scene);
                log::info!("tree state -> {:?}", state);
            }
            OverlayAction::ToggleMusic => {
                self.toggle_music(scene);
            }
            OverlayAction::PickPhotos => {
                let n = self.upload(scene, pick_photos());
                if n > 0 {
                    log::info!("{} photos chosen", n);
                }
            }
        }
    }

    fn start_music(&mut self, scene: &mut Scene) {
        match self.music.play() {
            Ok(()) => scene.set_music_playing(true),
            Err(e) => {
                log::warn!("music did not start: {}", e);
                scene.set_music_playing(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Counts, SceneConfig};
    use crate::error::AudioError;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Playback that succeeds or fails on demand and counts calls.
    struct Scripted {
        works: bool,
        playing: Rc<Cell<bool>>,
        plays: Rc<Cell<u32>>,
    }

    impl Playback for Scripted {
        fn play(&mut self) -> Result<(), AudioError> {
            self.plays.set(self.plays.get() + 1);
            if self.works {
                self.playing.set(true);
                Ok(())
            } else {
                Err(AudioError::Playback("blocked".into()))
            }
        }

        fn pause(&mut self) {
            self.playing.set(false);
        }
    }

    fn scene() -> Scene {
        let config = SceneConfig {
            counts: Counts {
                foliage: 10,
                ornaments: 4,
                lights: 4,
                ribbon_segments: 4,
                photos: 4,
                gifts: 2,
                snow: 4,
                stars: 4,
            },
            ..SceneConfig::default()
        };
        Scene::new(config, 7, TreeState::Chaos)
    }

    fn overlay(works: bool) -> (Overlay, Rc<Cell<bool>>, Rc<Cell<u32>>) {
        let playing = Rc::new(Cell::new(false));
        let plays = Rc::new(Cell::new(0));
        let music = Scripted {
            works,
            playing: Rc::clone(&playing),
            plays: Rc::clone(&plays),
        };
        (Overlay::new(Box::new(music)), playing, plays)
    }

    #[test]
    fn test_labels() {
        assert_eq!(toggle_label(TreeState::Chaos), "Assemble The Tree");
        assert_eq!(toggle_label(TreeState::Formed), "Unleash Chaos");
        assert_eq!(music_label(true), "Pause Music");
    }

    #[test]
    fn test_toggle_flips_and_starts_music() {
        let mut scene = scene();
        let (mut overlay, playing, plays) = overlay(true);
        assert_eq!(overlay.toggle(&mut scene), TreeState::Formed);
        assert!(scene.store().music_playing());
        assert!(playing.get());

        assert_eq!(overlay.toggle(&mut scene), TreeState::Chaos);
        assert_eq!(plays.get(), 1);
    }

    #[test]
    fn test_failed_music_stays_off() {
        let mut scene = scene();
        let (mut overlay, _, plays) = overlay(false);
        overlay.toggle(&mut scene);
        assert_eq!(scene.state(), TreeState::Formed);
        assert!(!scene.store().music_playing());
        assert!(!overlay.toggle_music(&mut scene));
        assert_eq!(plays.get(), 2);
    }

    #[test]
    fn test_toggle_music_pauses() {
        let mut scene = scene();
        let (mut overlay, playing, _) = overlay(true);
        assert!(overlay.toggle_music(&mut scene));
        assert!(!overlay.toggle_music(&mut scene));
        assert!(!playing.get());
    }

    #[test]
    fn test_upload_sets_images_and_forms() {
        let mut scene = scene();
        let (mut overlay, _, _) = overlay(true);
        let n = overlay.upload(&mut scene, ["/photos/a.jpg", "/photos/b.jpg"]);
        assert_eq!(n, 2);
        assert_eq!(scene.state(), TreeState::Formed);
        assert_eq!(
            scene.store().user_images(),
            &["file:///photos/a.jpg".to_string(), "file:///photos/b.jpg".to_string()]
        );
    }

    #[test]
    fn test_show_images_keeps_uris() {
        let mut scene = scene();
        let (mut overlay, _, _) = overlay(true);
        let uris = vec!["https://example.com/a.jpg".to_string(), "file:///b.png".to_string()];
        assert_eq!(overlay.show_images(&mut scene, uris.clone()), 2);
        assert_eq!(scene.store().user_images(), uris.as_slice());
        assert_eq!(scene.state(), TreeState::Formed);
    }

    #[test]
    fn test_empty_upload_is_noop() {
        let mut scene = scene();
        let (mut overlay, _, _) = overlay(true);
        assert_eq!(overlay.upload(&mut scene, Vec::<PathBuf>::new()), 0);
        assert_eq!(scene.state(), TreeState::Chaos);
        assert!(scene.store().user_images().is_empty());
    }

    #[test]
    fn test_image_paths() {
        assert!(is_image_path(Path::new("/tmp/a.JPG")));
        assert!(is_image_path(Path::new("b.webp")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("noext")));
    }

    #[test]
    fn test_apply_toggle_actions() {
        let mut scene = scene();
        let (mut overlay, playing, _) = overlay(true);
        overlay.apply(OverlayAction::ToggleState, &mut scene);
        assert_eq!(scene.state(), TreeState::Formed);
        assert!(playing.get());
        overlay.apply(OverlayAction::ToggleMusic, &mut scene);
        assert!(!scene.store().music_playing());
    }

    #[test]
    fn test_upload_keeps_formed() {
        let mut scene = scene();
        scene.set_state(TreeState::Formed);
        let (mut overlay, _, _) = overlay(true);
        overlay.upload(&mut scene, ["/a.png"]);
        assert_eq!(scene.state(), TreeState::Formed);
    }
}
