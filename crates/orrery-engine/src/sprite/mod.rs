//! Sprite contract: the shared base state every entity carries plus the
//! [`Sprite`] trait concrete kinds implement.
//!
//! Motion follows a two-step orientation discipline. Setting the angle never
//! moves anything by itself; callers set orientation (and speed) first and
//! then call [`SpriteBase::recalculate_movement_vector`] to derive the
//! movement vector from them. Each tick the movement vector is integrated
//! scaled by the elapsed epoch, so travel distance is a pure function of
//! simulated time regardless of frame rate.
//!
//! Deletion is two-phase: [`SpriteBase::queue_for_deletion`] only marks the
//! sprite (and hides it); removal happens during the collection's end-of-tick
//! sweep. A queued sprite is never considered visible again.

pub mod kinds;

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use orrery_core::prelude::{Rect, SpriteId, Vec2, NO_OWNER};

use crate::assets::ImageHandle;

/// How sprites are shared between the collection, controllers, and hosts.
pub type SharedSprite = Arc<RwLock<Box<dyn Sprite>>>;

/// Wraps a concrete sprite for insertion into the collection.
pub fn share(sprite: impl Sprite + 'static) -> SharedSprite {
    Arc::new(RwLock::new(Box::new(sprite)))
}

/// Broad sprite families. Tick controllers and bulk operations address
/// sprites by category rather than by concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteCategory {
    /// The privileged player sprite. Exactly one, ticked before everything
    /// else, rendered last.
    Player,
    /// Autonomous mobile entities.
    Drifter,
    /// Short-lived decorative fragments.
    Particle,
    /// Screen- or world-anchored text.
    TextBlock,
    /// Frame-animated images.
    Animation,
    /// Plain static images.
    Bitmap,
    /// Developer overlay markers.
    Debug,
}

// ---------------------------------------------------------------------------
// Base state
// ---------------------------------------------------------------------------

/// State every sprite carries. Concrete kinds embed one of these and expose
/// it through [`Sprite::base`] / [`Sprite::base_mut`].
#[derive(Debug, Clone)]
pub struct SpriteBase {
    id: SpriteId,
    category: SpriteCategory,
    tag: String,
    owner: SpriteId,
    location: Vec2,
    size: Vec2,
    /// Radians, clockwise from screen-east.
    orientation: f32,
    /// World units per epoch. Derived from orientation and speed.
    movement: Vec2,
    speed: f32,
    /// Radians per epoch applied during motion integration.
    rotation_speed: f32,
    z_order: i32,
    fixed_position: bool,
    visible: bool,
    dead: bool,
    queued_for_deletion: bool,
    image: Option<Arc<ImageHandle>>,
}

impl SpriteBase {
    pub fn new(id: SpriteId, category: SpriteCategory) -> Self {
        Self {
            id,
            category,
            tag: String::new(),
            owner: NO_OWNER,
            location: Vec2::ZERO,
            size: Vec2::ZERO,
            orientation: 0.0,
            movement: Vec2::ZERO,
            speed: 0.0,
            rotation_speed: 0.0,
            z_order: 0,
            fixed_position: false,
            visible: true,
            dead: false,
            queued_for_deletion: false,
            image: None,
        }
    }

    pub fn id(&self) -> SpriteId {
        self.id
    }

    pub fn category(&self) -> SpriteCategory {
        self.category
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn owner(&self) -> SpriteId {
        self.owner
    }

    pub fn set_owner(&mut self, owner: SpriteId) {
        self.owner = owner;
    }

    pub fn location(&self) -> Vec2 {
        self.location
    }

    pub fn set_location(&mut self, location: Vec2) {
        self.location = location;
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn set_z_order(&mut self, z: i32) {
        self.z_order = z;
    }

    pub fn is_fixed_position(&self) -> bool {
        self.fixed_position
    }

    pub fn set_fixed_position(&mut self, fixed: bool) {
        self.fixed_position = fixed;
    }

    pub fn image(&self) -> Option<&Arc<ImageHandle>> {
        self.image.as_ref()
    }

    /// Attaches an image and adopts its size as the sprite extent.
    pub fn set_image(&mut self, image: Arc<ImageHandle>) {
        self.size = image.size;
        self.image = Some(image);
    }

    // -- orientation and motion ---------------------------------------------

    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    /// Sets the facing angle. Does not touch the movement vector; callers
    /// follow up with [`Self::recalculate_movement_vector`] when the sprite
    /// should travel along its new heading.
    pub fn set_orientation(&mut self, radians: f32) {
        self.orientation = radians;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn set_rotation_speed(&mut self, radians_per_epoch: f32) {
        self.rotation_speed = radians_per_epoch;
    }

    pub fn movement_vector(&self) -> Vec2 {
        self.movement
    }

    pub fn set_movement_vector(&mut self, movement: Vec2) {
        self.movement = movement;
    }

    /// Derives the movement vector from the current orientation and speed.
    pub fn recalculate_movement_vector(&mut self) {
        self.movement = Vec2::from_angle(self.orientation) * self.speed;
    }

    /// Movement vector a sprite would have along `radians` at current speed,
    /// without changing any state.
    pub fn movement_vector_at(&self, radians: f32) -> Vec2 {
        Vec2::from_angle(radians) * self.speed
    }

    /// Integrates one tick of motion: rotation speed then the movement
    /// vector, both scaled by the elapsed epoch.
    pub fn apply_motion(&mut self, epoch: f32) {
        if self.rotation_speed != 0.0 {
            self.orientation += self.rotation_speed * epoch;
        }
        self.location += self.movement * epoch;
    }

    // -- visibility and lifecycle -------------------------------------------

    /// Visible means drawable and tickable. A sprite queued for deletion is
    /// invisible no matter what the flag says.
    pub fn visible(&self) -> bool {
        self.visible && !self.queued_for_deletion
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn mark_dead(&mut self) {
        self.dead = true;
    }

    pub fn revive(&mut self) {
        self.dead = false;
    }

    pub fn is_queued_for_deletion(&self) -> bool {
        self.queued_for_deletion
    }

    /// First phase of deletion: mark and hide. Physical removal happens at
    /// the next sweep. Idempotent.
    pub fn queue_for_deletion(&mut self) {
        self.queued_for_deletion = true;
        self.visible = false;
    }

    // -- geometry ------------------------------------------------------------

    /// Axis-aligned bounds centered on the sprite location.
    pub fn bounds(&self) -> Rect {
        Rect::centered_on(self.location, self.size)
    }

    /// Screen-space location: fixed-position sprites ignore the window
    /// offset, everything else scrolls with it.
    pub fn render_location(&self, window_offset: Vec2) -> Vec2 {
        if self.fixed_position {
            self.location
        } else {
            self.location - window_offset
        }
    }

    pub fn render_bounds(&self, window_offset: Vec2) -> Rect {
        Rect::centered_on(self.render_location(window_offset), self.size)
    }

    pub fn intersects(&self, center: Vec2, extent: Vec2) -> bool {
        self.bounds().intersects(&Rect::centered_on(center, extent))
    }

    pub fn render_intersects(&self, window_offset: Vec2, center: Vec2, extent: Vec2) -> bool {
        self.render_bounds(window_offset)
            .intersects(&Rect::centered_on(center, extent))
    }

    pub fn distance_to(&self, other: &SpriteBase) -> f32 {
        self.location.distance_to(other.location)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for concrete sprite kinds.
///
/// The lifecycle hooks run at well-defined points: `before_create` right
/// before the sprite enters the pending-insert queue, `after_create` right
/// after, `on_queued_for_deletion` when a collection-side bulk operation
/// marks the sprite, and `cleanup` during the sweep that physically removes
/// it.
pub trait Sprite: Send + Sync {
    fn base(&self) -> &SpriteBase;
    fn base_mut(&mut self) -> &mut SpriteBase;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Per-tick behavior, run before motion integration. `displacement` is
    /// the player's displacement for this tick.
    fn apply_intelligence(&mut self, _epoch: f32, _displacement: Vec2) {}

    fn before_create(&mut self) {}
    fn after_create(&mut self) {}
    fn on_queued_for_deletion(&mut self) {}

    fn cleanup(&mut self) {
        self.base_mut().set_visible(false);
    }
}
