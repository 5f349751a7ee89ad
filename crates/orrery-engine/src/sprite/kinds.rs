//! Built-in sprite kinds: player, drifters, particles, and text blocks.

use std::any::Any;
use std::sync::Arc;

use orrery_core::prelude::{SpriteId, Vec2};

use crate::assets::ImageHandle;
use crate::sprite::{Sprite, SpriteBase, SpriteCategory};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

const PLAYER_STARTING_HULL: i32 = 100;
const PLAYER_STARTING_SHIELDS: i32 = 100;

/// The single privileged sprite. Its movement vector, scaled by the elapsed
/// epoch, becomes the displacement vector the rest of the frame observes.
pub struct PlayerSprite {
    base: SpriteBase,
    hull: i32,
    shields: i32,
}

impl PlayerSprite {
    pub fn new(id: SpriteId) -> Self {
        let mut base = SpriteBase::new(id, SpriteCategory::Player);
        base.set_tag("player");
        base.set_visible(false);
        Self {
            base,
            hull: PLAYER_STARTING_HULL,
            shields: PLAYER_STARTING_SHIELDS,
        }
    }

    pub fn hull(&self) -> i32 {
        self.hull
    }

    pub fn shields(&self) -> i32 {
        self.shields
    }

    /// Applies damage, shields first. The sprite is marked dead when the
    /// hull reaches zero; the collection sweep handles the aftermath.
    pub fn take_damage(&mut self, amount: i32) {
        let absorbed = amount.min(self.shields);
        self.shields -= absorbed;
        self.hull -= amount - absorbed;
        if self.hull <= 0 {
            self.hull = 0;
            self.base.mark_dead();
        }
    }

    /// Restores hull, shields, and motion state for a fresh start.
    pub fn reset(&mut self, location: Vec2) {
        self.hull = PLAYER_STARTING_HULL;
        self.shields = PLAYER_STARTING_SHIELDS;
        self.base.revive();
        self.base.set_location(location);
        self.base.set_speed(0.0);
        self.base.set_orientation(0.0);
        self.base.recalculate_movement_vector();
    }
}

impl Sprite for PlayerSprite {
    fn base(&self) -> &SpriteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SpriteBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Drifter
// ---------------------------------------------------------------------------

/// Autonomous mobile sprite. Travels along its movement vector; hosts attach
/// behavior by subclassing the category controller or scheduling events.
pub struct DrifterSprite {
    base: SpriteBase,
}

impl DrifterSprite {
    pub fn new(id: SpriteId) -> Self {
        Self {
            base: SpriteBase::new(id, SpriteCategory::Drifter),
        }
    }

    pub fn with_image(id: SpriteId, image: Arc<ImageHandle>) -> Self {
        let mut sprite = Self::new(id);
        sprite.base.set_image(image);
        sprite
    }
}

impl Sprite for DrifterSprite {
    fn base(&self) -> &SpriteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SpriteBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Particle
// ---------------------------------------------------------------------------

/// What eventually removes a particle from the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleCleanup {
    /// Lives until something else deletes it.
    None,
    /// Fades out at `rate` intensity per epoch, then queues itself.
    FadeOut { rate: f32 },
}

/// Short-lived decorative fragment. Intensity starts at `1.0`; a fading
/// particle queues its own deletion once intensity reaches zero.
pub struct ParticleSprite {
    base: SpriteBase,
    cleanup: ParticleCleanup,
    intensity: f32,
}

impl ParticleSprite {
    pub fn new(id: SpriteId, cleanup: ParticleCleanup) -> Self {
        Self {
            base: SpriteBase::new(id, SpriteCategory::Particle),
            cleanup,
            intensity: 1.0,
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl Sprite for ParticleSprite {
    fn base(&self) -> &SpriteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SpriteBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn apply_intelligence(&mut self, epoch: f32, _displacement: Vec2) {
        if let ParticleCleanup::FadeOut { rate } = self.cleanup {
            self.intensity -= rate * epoch;
            if self.intensity <= 0.0 {
                self.intensity = 0.0;
                self.base.queue_for_deletion();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Approximate advance width per character, used for centering. Real text
/// metrics belong to the renderer; the engine only needs a rough extent.
const GLYPH_WIDTH: f32 = 8.0;
const GLYPH_HEIGHT: f32 = 16.0;

/// Screen-anchored text block. Fixed position by default so it ignores
/// viewport scrolling; callers can unfix it for world-space labels.
pub struct TextSprite {
    base: SpriteBase,
    text: String,
}

impl TextSprite {
    pub fn new(id: SpriteId, text: impl Into<String>) -> Self {
        let mut base = SpriteBase::new(id, SpriteCategory::TextBlock);
        base.set_fixed_position(true);
        let mut sprite = Self { base, text: String::new() };
        sprite.set_text(text);
        sprite
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.base.set_size(Vec2::new(
            self.text.chars().count() as f32 * GLYPH_WIDTH,
            GLYPH_HEIGHT,
        ));
    }

    /// Sets the text and re-centers it horizontally on a canvas of the given
    /// width, keeping the current vertical position.
    pub fn set_text_centered(&mut self, text: impl Into<String>, canvas_width: f32) {
        self.set_text(text);
        let y = self.base.location().y;
        self.base.set_location(Vec2::new(canvas_width * 0.5, y));
    }
}

impl Sprite for TextSprite {
    fn base(&self) -> &SpriteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SpriteBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. player ----------------------------------------------------------

    #[test]
    fn player_starts_hidden_with_full_hull() {
        let player = PlayerSprite::new(1);
        assert!(!player.base().visible());
        assert_eq!(player.hull(), PLAYER_STARTING_HULL);
        assert_eq!(player.base().tag(), "player");
    }

    #[test]
    fn damage_drains_shields_before_hull() {
        let mut player = PlayerSprite::new(1);
        player.take_damage(40);
        assert_eq!(player.shields(), 60);
        assert_eq!(player.hull(), PLAYER_STARTING_HULL);

        player.take_damage(80);
        assert_eq!(player.shields(), 0);
        assert_eq!(player.hull(), 80);
    }

    #[test]
    fn lethal_damage_marks_dead_and_reset_revives() {
        let mut player = PlayerSprite::new(1);
        player.take_damage(500);
        assert!(player.base().is_dead());
        assert_eq!(player.hull(), 0);

        player.reset(Vec2::new(100.0, 100.0));
        assert!(!player.base().is_dead());
        assert_eq!(player.hull(), PLAYER_STARTING_HULL);
        assert_eq!(player.base().location(), Vec2::new(100.0, 100.0));
    }

    // -- 2. particles --------------------------------------------------------

    #[test]
    fn fading_particle_queues_itself_at_zero_intensity() {
        let mut particle = ParticleSprite::new(2, ParticleCleanup::FadeOut { rate: 0.5 });
        particle.apply_intelligence(1.0, Vec2::ZERO);
        assert!((particle.intensity() - 0.5).abs() < 1e-6);
        assert!(!particle.base().is_queued_for_deletion());

        particle.apply_intelligence(1.0, Vec2::ZERO);
        assert_eq!(particle.intensity(), 0.0);
        assert!(particle.base().is_queued_for_deletion());
    }

    #[test]
    fn persistent_particle_never_fades() {
        let mut particle = ParticleSprite::new(2, ParticleCleanup::None);
        particle.apply_intelligence(10.0, Vec2::ZERO);
        assert_eq!(particle.intensity(), 1.0);
        assert!(!particle.base().is_queued_for_deletion());
    }

    // -- 3. text -------------------------------------------------------------

    #[test]
    fn text_is_fixed_position_and_sized_to_content() {
        let sprite = TextSprite::new(3, "hello");
        assert!(sprite.base().is_fixed_position());
        assert_eq!(sprite.base().size().x, 5.0 * GLYPH_WIDTH);
    }

    #[test]
    fn set_text_centered_recenters_horizontally() {
        let mut sprite = TextSprite::new(3, "hi");
        sprite.base_mut().set_location(Vec2::new(0.0, 40.0));
        sprite.set_text_centered("a longer headline", 800.0);
        assert_eq!(sprite.base().location(), Vec2::new(400.0, 40.0));
        assert_eq!(sprite.text(), "a longer headline");
    }
}
