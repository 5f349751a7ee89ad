//! Tick controllers: the per-frame units of work the world clock fans out
//! to, plus the factory registry that spawns sprites by category tag.
//!
//! Controllers come in two shapes. Vectored controllers receive the elapsed
//! epoch and the player's displacement vector for the frame; unvectored
//! controllers receive nothing and are for work with no notion of world
//! displacement. Both run strictly after the player controller, so every one
//! of them observes the same displacement.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use orrery_core::prelude::{SpriteId, Vec2};

use crate::assets::AssetCatalog;
use crate::collection::SpriteCollection;
use crate::display::Display;
use crate::io::{InputSnapshot, PlayerKey};
use crate::sprite::kinds::{ParticleCleanup, ParticleSprite};
use crate::sprite::{share, SharedSprite, Sprite, SpriteCategory};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Controller traits
// ---------------------------------------------------------------------------

/// Per-frame work that depends on simulated time and the player's motion.
pub trait VectoredTickController: Send + Sync {
    fn name(&self) -> &str;
    fn execute_tick(&self, epoch: f32, displacement: Vec2);
}

/// Per-frame work with no relationship to world displacement.
pub trait UnvectoredTickController: Send + Sync {
    fn name(&self) -> &str;
    fn execute_tick(&self);
}

// ---------------------------------------------------------------------------
// Category controller
// ---------------------------------------------------------------------------

/// Drives every visible sprite of one category through a tick: behavior
/// first, then motion integration. Fixed-position sprites skip the motion
/// step so screen-anchored overlays stay put.
pub struct CategoryTickController {
    name: String,
    category: SpriteCategory,
    sprites: Arc<SpriteCollection>,
}

impl CategoryTickController {
    pub fn new(category: SpriteCategory, sprites: Arc<SpriteCollection>) -> Self {
        Self {
            name: format!("{category:?}"),
            category,
            sprites,
        }
    }

    pub fn category(&self) -> SpriteCategory {
        self.category
    }
}

impl VectoredTickController for CategoryTickController {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute_tick(&self, epoch: f32, displacement: Vec2) {
        for handle in self.sprites.visible_of_category(self.category) {
            let mut sprite = handle.write();
            sprite.apply_intelligence(epoch, displacement);
            if !sprite.base().is_fixed_position() {
                sprite.base_mut().apply_motion(epoch);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Player controller
// ---------------------------------------------------------------------------

/// Radians per epoch the player turns while a rotate key is held.
const PLAYER_TURN_RATE: f32 = 0.05;
/// Speed multiplier while boosting.
const PLAYER_BOOST_FACTOR: f32 = 2.0;

/// The privileged controller. Runs before every other controller each tick;
/// its return value is the frame's displacement vector, which the clock then
/// hands to all vectored controllers.
pub struct PlayerTickController {
    sprite: SharedSprite,
}

impl PlayerTickController {
    pub fn new(sprite: SharedSprite) -> Self {
        Self { sprite }
    }

    pub fn sprite(&self) -> SharedSprite {
        self.sprite.clone()
    }

    /// Steers from the frame's input snapshot, integrates the player's
    /// motion, and returns the resulting displacement. A hidden player
    /// contributes zero displacement.
    pub fn execute_tick(&self, epoch: f32, input: &InputSnapshot) -> Vec2 {
        let mut sprite = self.sprite.write();
        if !sprite.base().visible() {
            return Vec2::ZERO;
        }

        let turn = input.weight(PlayerKey::RotateClockwise)
            - input.weight(PlayerKey::RotateCounterClockwise);
        if turn != 0.0 {
            let orientation = sprite.base().orientation() + turn * PLAYER_TURN_RATE * epoch;
            sprite.base_mut().set_orientation(orientation);
            sprite.base_mut().recalculate_movement_vector();
        }

        let mut displacement = sprite.base().movement_vector() * epoch;
        if input.is_pressed(PlayerKey::SpeedBoost) {
            displacement = displacement * PLAYER_BOOST_FACTOR;
        }

        let location = sprite.base().location() + displacement;
        sprite.base_mut().set_location(location);
        displacement
    }
}

// ---------------------------------------------------------------------------
// Sprite factories
// ---------------------------------------------------------------------------

/// Everything a factory may draw on while building a sprite.
pub struct SpawnContext<'a> {
    pub sprites: &'a SpriteCollection,
    pub assets: &'a AssetCatalog,
    pub display: &'a Display,
}

/// Builds one sprite of a registered kind. Factories allocate the id through
/// the context's collection and resolve any assets through its catalog.
pub type SpriteFactory =
    Box<dyn Fn(&SpawnContext<'_>) -> Result<Box<dyn Sprite>, EngineError> + Send + Sync>;

/// Maps category tags to factories. Registration happens before the engine
/// starts; the set is frozen once the clock is running.
pub struct FactoryRegistry {
    factories: RwLock<HashMap<String, SpriteFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, tag: &str, factory: SpriteFactory) -> Result<(), EngineError> {
        let mut factories = self.factories.write();
        if factories.contains_key(tag) {
            return Err(EngineError::DuplicateFactory { tag: tag.to_owned() });
        }
        factories.insert(tag.to_owned(), factory);
        Ok(())
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.read().contains_key(tag)
    }

    pub fn registered_tags(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Builds a sprite of the tagged kind. Unknown tags are an error; the
    /// caller decides placement and insertion.
    pub fn build(&self, tag: &str, ctx: &SpawnContext<'_>) -> Result<Box<dyn Sprite>, EngineError> {
        let factories = self.factories.read();
        let factory = factories
            .get(tag)
            .ok_or_else(|| EngineError::UnknownCategory { tag: tag.to_owned() })?;
        factory(ctx)
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a tagged sprite, drops it somewhere just off screen on a random
/// heading, and queues it for deferred insertion. Returns the new id.
pub fn spawn_off_screen(
    registry: &FactoryRegistry,
    ctx: &SpawnContext<'_>,
    tag: &str,
    rng: &mut impl Rng,
) -> Result<SpriteId, EngineError> {
    let mut sprite = registry.build(tag, ctx)?;
    let id = sprite.base().id();
    sprite
        .base_mut()
        .set_location(ctx.display.random_off_screen_location(rng));
    sprite.base_mut().set_orientation(rng.gen_range(0.0..TAU));
    sprite.base_mut().recalculate_movement_vector();
    sprite.before_create();
    ctx.sprites.insert(share_boxed(sprite));
    tracing::debug!(tag, sprite = id, "spawned off screen");
    Ok(id)
}

fn share_boxed(sprite: Box<dyn Sprite>) -> SharedSprite {
    Arc::new(RwLock::new(sprite))
}

// ---------------------------------------------------------------------------
// Particle bursts
// ---------------------------------------------------------------------------

/// Scatters a burst of fading particles around a point. Each particle gets a
/// random heading, speed, and fade rate; all of them queue their own deletion
/// once fully faded. Insertion is deferred like any other spawn.
pub fn particle_burst(
    sprites: &SpriteCollection,
    rng: &mut impl Rng,
    location: Vec2,
    count: usize,
) {
    for _ in 0..count {
        let mut particle = ParticleSprite::new(
            sprites.allocate_id(),
            ParticleCleanup::FadeOut { rate: rng.gen_range(0.01..0.05) },
        );
        particle.base_mut().set_location(location);
        particle.base_mut().set_size(Vec2::new(2.0, 2.0));
        particle.base_mut().set_orientation(rng.gen_range(0.0..TAU));
        particle.base_mut().set_speed(rng.gen_range(0.5..3.0));
        particle.base_mut().recalculate_movement_vector();
        sprites.insert(share(particle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetLoader;
    use crate::sprite::kinds::{DrifterSprite, PlayerSprite, TextSprite};
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn fixtures() -> (Arc<SpriteCollection>, AssetCatalog, Display) {
        (
            Arc::new(SpriteCollection::new()),
            AssetCatalog::new(Box::new(MemoryAssetLoader::new())),
            Display::new(Vec2::new(800.0, 600.0)),
        )
    }

    // -- 1. category controller ---------------------------------------------

    #[test]
    fn category_controller_moves_only_its_own_category() {
        let (sprites, _, _) = fixtures();
        let drifter = {
            let mut sprite = DrifterSprite::new(sprites.allocate_id());
            sprite.base_mut().set_speed(10.0);
            sprite.base_mut().recalculate_movement_vector();
            share(sprite)
        };
        let text = share(TextSprite::new(sprites.allocate_id(), "hud"));
        sprites.insert_now(drifter.clone());
        sprites.insert_now(text.clone());

        let controller = CategoryTickController::new(SpriteCategory::Drifter, sprites);
        controller.execute_tick(2.0, Vec2::ZERO);

        assert!((drifter.read().base().location().x - 20.0).abs() < 1e-4);
        assert_eq!(text.read().base().location(), Vec2::ZERO, "wrong category untouched");
    }

    #[test]
    fn fixed_position_sprites_skip_motion() {
        let (sprites, _, _) = fixtures();
        let text = {
            let mut sprite = TextSprite::new(sprites.allocate_id(), "hud");
            sprite.base_mut().set_speed(50.0);
            sprite.base_mut().recalculate_movement_vector();
            share(sprite)
        };
        sprites.insert_now(text.clone());

        let controller = CategoryTickController::new(SpriteCategory::TextBlock, sprites);
        controller.execute_tick(1.0, Vec2::ZERO);
        assert_eq!(text.read().base().location(), Vec2::ZERO);
    }

    // -- 2. player controller -----------------------------------------------

    fn visible_player(sprites: &SpriteCollection) -> SharedSprite {
        let mut player = PlayerSprite::new(sprites.allocate_id());
        player.base_mut().set_visible(true);
        player.base_mut().set_speed(10.0);
        player.base_mut().recalculate_movement_vector();
        share(player)
    }

    #[test]
    fn displacement_is_velocity_times_epoch() {
        let (sprites, _, _) = fixtures();
        let controller = PlayerTickController::new(visible_player(&sprites));

        let displacement = controller.execute_tick(0.5, &InputSnapshot::new());
        assert!((displacement.x - 5.0).abs() < 1e-4);
        assert!(displacement.y.abs() < 1e-4);
        assert!(
            (controller.sprite().read().base().location().x - 5.0).abs() < 1e-4,
            "player advances by its own displacement"
        );
    }

    #[test]
    fn hidden_player_contributes_zero_displacement() {
        let (sprites, _, _) = fixtures();
        let player = visible_player(&sprites);
        player.write().base_mut().set_visible(false);
        let controller = PlayerTickController::new(player);

        assert_eq!(controller.execute_tick(1.0, &InputSnapshot::new()), Vec2::ZERO);
    }

    #[test]
    fn rotate_keys_steer_through_the_two_step_api() {
        let (sprites, _, _) = fixtures();
        let controller = PlayerTickController::new(visible_player(&sprites));

        let mut input = InputSnapshot::new();
        input.press(PlayerKey::RotateClockwise);
        controller.execute_tick(1.0, &input);

        let sprite = controller.sprite();
        let guard = sprite.read();
        assert!((guard.base().orientation() - PLAYER_TURN_RATE).abs() < 1e-6);
        let expected = Vec2::from_angle(PLAYER_TURN_RATE) * 10.0;
        assert!((guard.base().movement_vector().x - expected.x).abs() < 1e-4);
        assert!((guard.base().movement_vector().y - expected.y).abs() < 1e-4);
    }

    #[test]
    fn speed_boost_doubles_displacement() {
        let (sprites, _, _) = fixtures();
        let controller = PlayerTickController::new(visible_player(&sprites));

        let mut input = InputSnapshot::new();
        input.press(PlayerKey::SpeedBoost);
        let displacement = controller.execute_tick(1.0, &input);
        assert!((displacement.x - 20.0).abs() < 1e-4);
    }

    // -- 3. factories and spawning ------------------------------------------

    #[test]
    fn unknown_tag_is_an_error() {
        let (sprites, assets, display) = fixtures();
        let registry = FactoryRegistry::new();
        let ctx = SpawnContext { sprites: &sprites, assets: &assets, display: &display };
        let err = registry.build("no-such-kind", &ctx).err().unwrap();
        assert!(matches!(err, EngineError::UnknownCategory { .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = FactoryRegistry::new();
        let factory = |ctx: &SpawnContext<'_>| -> Result<Box<dyn Sprite>, EngineError> {
            Ok(Box::new(DrifterSprite::new(ctx.sprites.allocate_id())))
        };
        registry.register("drifter", Box::new(factory)).unwrap();
        let err = registry.register("drifter", Box::new(factory)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateFactory { .. }));
    }

    #[test]
    fn spawn_off_screen_defers_insertion() {
        let (sprites, assets, display) = fixtures();
        let registry = FactoryRegistry::new();
        registry
            .register(
                "drifter",
                Box::new(|ctx: &SpawnContext<'_>| {
                    let mut sprite = DrifterSprite::new(ctx.sprites.allocate_id());
                    sprite.base_mut().set_tag("drifter");
                    sprite.base_mut().set_speed(4.0);
                    Ok(Box::new(sprite) as Box<dyn Sprite>)
                }),
            )
            .unwrap();

        let ctx = SpawnContext { sprites: &sprites, assets: &assets, display: &display };
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let id = spawn_off_screen(&registry, &ctx, "drifter", &mut rng).unwrap();

        assert_eq!(sprites.len(), 0, "spawn must go through the pending queue");
        sprites.apply_pending_inserts();
        let sprite = sprites.by_id(id).unwrap();
        let guard = sprite.read();
        assert!(!display.viewport().contains(guard.base().location()));
        assert!(
            guard.base().movement_vector().length() > 0.0,
            "heading must be derived from the random orientation"
        );
    }

    // -- 4. particle bursts --------------------------------------------------

    #[test]
    fn burst_scatters_fading_particles() {
        let (sprites, _, _) = fixtures();
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        particle_burst(&sprites, &mut rng, Vec2::new(40.0, 40.0), 12);

        assert_eq!(sprites.pending_count(), 12);
        sprites.apply_pending_inserts();
        for sprite in sprites.of_category(SpriteCategory::Particle) {
            let guard = sprite.read();
            assert_eq!(guard.base().location(), Vec2::new(40.0, 40.0));
            assert!(guard.base().movement_vector().length() > 0.0);
        }
    }

    #[test]
    fn burst_particles_eventually_sweep_themselves_out() {
        let (sprites, _, _) = fixtures();
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        particle_burst(&sprites, &mut rng, Vec2::ZERO, 5);
        sprites.apply_pending_inserts();

        let controller = CategoryTickController::new(SpriteCategory::Particle, sprites.clone());
        // Max fade rate is 0.05/epoch, so 200 epochs drains any particle.
        for _ in 0..200 {
            controller.execute_tick(1.0, Vec2::ZERO);
            sprites.sweep_deletions();
        }
        assert!(sprites.is_empty());
    }
}
