//! The sprite collection: deferred insertion, two-phase deletion, and the
//! query surface controllers and hosts use to find sprites.
//!
//! Structural mutation never happens mid-tick. [`SpriteCollection::insert`]
//! parks the sprite in a pending queue that the world clock drains at the
//! start of the next event-poll phase, and deletion marks sprites that the
//! end-of-tick sweep physically removes. Between those two points every
//! iterator in flight sees a stable membership.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use orrery_core::prelude::{SpriteId, SpriteIdAllocator, Vec2};

use crate::sprite::{SharedSprite, SpriteCategory};

/// Categories cleared by [`SpriteCollection::queue_deletion_of_action_sprites`]:
/// the gameplay sprites, as opposed to the player, text overlays, and debug
/// markers which survive a scene reset.
const ACTION_CATEGORIES: [SpriteCategory; 4] = [
    SpriteCategory::Drifter,
    SpriteCategory::Particle,
    SpriteCategory::Animation,
    SpriteCategory::Bitmap,
];

pub struct SpriteCollection {
    live: RwLock<Vec<SharedSprite>>,
    pending: Mutex<Vec<SharedSprite>>,
    ids: SpriteIdAllocator,
    /// While set, insertions are silently dropped. Used during the startup
    /// warm-up pass that constructs one sprite of every kind purely to load
    /// their assets.
    hydrating: AtomicBool,
    player: RwLock<Option<SharedSprite>>,
}

impl SpriteCollection {
    pub fn new() -> Self {
        Self {
            live: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            ids: SpriteIdAllocator::new(),
            hydrating: AtomicBool::new(false),
            player: RwLock::new(None),
        }
    }

    /// Allocates the next sprite id. Ids are unique for the lifetime of the
    /// collection and never reused.
    pub fn allocate_id(&self) -> SpriteId {
        self.ids.next()
    }

    pub fn set_hydrating(&self, hydrating: bool) {
        self.hydrating.store(hydrating, Ordering::SeqCst);
    }

    pub fn is_hydrating(&self) -> bool {
        self.hydrating.load(Ordering::SeqCst)
    }

    // -- insertion -----------------------------------------------------------

    /// Queues a sprite for insertion. It becomes part of the collection at
    /// the next event-poll phase, not immediately; during hydration the
    /// sprite is dropped instead.
    pub fn insert(&self, sprite: SharedSprite) {
        if self.is_hydrating() {
            let id = sprite.read().base().id();
            tracing::debug!(sprite = id, "insert suppressed during hydration");
            return;
        }
        self.pending.lock().push(sprite);
    }

    /// Inserts immediately, bypassing deferral. Reserved for scene setup
    /// before the clock starts (engine text overlays, the player sprite).
    pub fn insert_now(&self, sprite: SharedSprite) {
        sprite.write().after_create();
        self.live.write().push(sprite);
    }

    /// Drains the pending queue into the live set. Called once per tick by
    /// the world clock; returns how many sprites materialized.
    pub fn apply_pending_inserts(&self) -> usize {
        let drained: Vec<SharedSprite> = std::mem::take(&mut *self.pending.lock());
        let applied = drained.len();
        if applied > 0 {
            let mut live = self.live.write();
            for sprite in drained {
                sprite.write().after_create();
                live.push(sprite);
            }
            tracing::trace!(applied, "pending inserts applied");
        }
        applied
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    // -- the player ----------------------------------------------------------

    /// Registers the privileged player sprite and inserts it directly. The
    /// player participates in queries like any other sprite but is ticked
    /// first and rendered last.
    pub fn set_player(&self, sprite: SharedSprite) {
        self.insert_now(sprite.clone());
        *self.player.write() = Some(sprite);
    }

    pub fn player(&self) -> Option<SharedSprite> {
        self.player.read().clone()
    }

    // -- deletion ------------------------------------------------------------

    fn mark(sprite: &SharedSprite) {
        let mut guard = sprite.write();
        guard.base_mut().queue_for_deletion();
        guard.on_queued_for_deletion();
    }

    /// Marks one sprite by id. Covers both live and still-pending sprites;
    /// returns whether anything matched.
    pub fn queue_for_deletion(&self, id: SpriteId) -> bool {
        let mut marked = false;
        for sprite in self.live.read().iter() {
            if sprite.read().base().id() == id {
                Self::mark(sprite);
                marked = true;
            }
        }
        for sprite in self.pending.lock().iter() {
            if sprite.read().base().id() == id {
                Self::mark(sprite);
                marked = true;
            }
        }
        marked
    }

    /// Marks every sprite carrying `tag`, including sprites still waiting in
    /// the pending-insert queue, so an insert-then-delete in one tick leaves
    /// nothing behind after the next sweep.
    pub fn queue_for_deletion_by_tag(&self, tag: &str) -> usize {
        self.mark_matching(|sprite| sprite.read().base().tag() == tag)
    }

    /// Marks every sprite owned by `owner`, live or pending.
    pub fn queue_for_deletion_by_owner(&self, owner: SpriteId) -> usize {
        self.mark_matching(|sprite| sprite.read().base().owner() == owner)
    }

    /// Marks every sprite of one category, live or pending.
    pub fn queue_for_deletion_by_category(&self, category: SpriteCategory) -> usize {
        self.mark_matching(|sprite| sprite.read().base().category() == category)
    }

    /// Clears the stage: marks all gameplay sprites (drifters, particles,
    /// animations, bitmaps) while leaving the player, text, and debug
    /// overlays alone.
    pub fn queue_deletion_of_action_sprites(&self) -> usize {
        self.mark_matching(|sprite| {
            ACTION_CATEGORIES.contains(&sprite.read().base().category())
        })
    }

    fn mark_matching(&self, matches: impl Fn(&SharedSprite) -> bool) -> usize {
        let mut marked = 0;
        for sprite in self.live.read().iter() {
            if matches(sprite) {
                Self::mark(sprite);
                marked += 1;
            }
        }
        for sprite in self.pending.lock().iter() {
            if matches(sprite) {
                Self::mark(sprite);
                marked += 1;
            }
        }
        marked
    }

    /// Second phase of deletion: physically removes everything marked since
    /// the last sweep, running each sprite's `cleanup` hook. Also the point
    /// where a dead player is hidden and revived for its next appearance.
    /// Called once per tick, after all controllers have run.
    pub fn sweep_deletions(&self) -> usize {
        let mut removed = 0;
        {
            let mut live = self.live.write();
            live.retain(|sprite| {
                let queued = sprite.read().base().is_queued_for_deletion();
                if queued {
                    sprite.write().cleanup();
                    removed += 1;
                }
                !queued
            });
        }
        // Pending sprites marked before they ever materialized just vanish.
        {
            let mut pending = self.pending.lock();
            pending.retain(|sprite| {
                let queued = sprite.read().base().is_queued_for_deletion();
                if queued {
                    removed += 1;
                }
                !queued
            });
        }
        if let Some(player) = self.player() {
            let mut guard = player.write();
            if guard.base().is_dead() {
                guard.base_mut().set_visible(false);
                guard.base_mut().revive();
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "sprite sweep");
        }
        removed
    }

    // -- queries -------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    pub fn all(&self) -> Vec<SharedSprite> {
        self.live.read().clone()
    }

    pub fn visible(&self) -> Vec<SharedSprite> {
        self.collect(|sprite| sprite.read().base().visible())
    }

    pub fn by_id(&self, id: SpriteId) -> Option<SharedSprite> {
        self.live
            .read()
            .iter()
            .find(|sprite| sprite.read().base().id() == id)
            .cloned()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<SharedSprite> {
        self.collect(|sprite| sprite.read().base().tag() == tag)
    }

    /// The sprite carrying `tag`, when exactly one does.
    pub fn single_by_tag(&self, tag: &str) -> Option<SharedSprite> {
        let mut matches = self.by_tag(tag);
        if matches.len() == 1 {
            matches.pop()
        } else {
            None
        }
    }

    pub fn by_owner(&self, owner: SpriteId) -> Vec<SharedSprite> {
        self.collect(|sprite| sprite.read().base().owner() == owner)
    }

    pub fn of_category(&self, category: SpriteCategory) -> Vec<SharedSprite> {
        self.collect(|sprite| sprite.read().base().category() == category)
    }

    pub fn visible_of_category(&self, category: SpriteCategory) -> Vec<SharedSprite> {
        self.collect(|sprite| {
            let guard = sprite.read();
            guard.base().visible() && guard.base().category() == category
        })
    }

    /// Visible sprites whose world-space bounds intersect the given box.
    pub fn intersections(&self, center: Vec2, extent: Vec2) -> Vec<SharedSprite> {
        self.collect(|sprite| {
            let guard = sprite.read();
            guard.base().visible() && guard.base().intersects(center, extent)
        })
    }

    /// Visible sprites overlapping `subject`, excluding `subject` itself.
    pub fn intersections_with(&self, subject: &SharedSprite) -> Vec<SharedSprite> {
        let (id, center, extent) = {
            let guard = subject.read();
            (guard.base().id(), guard.base().location(), guard.base().size())
        };
        self.collect(|sprite| {
            let guard = sprite.read();
            guard.base().id() != id
                && guard.base().visible()
                && guard.base().intersects(center, extent)
        })
    }

    /// Visible sprites intersecting a screen-space box under the given
    /// window offset.
    pub fn render_intersections(
        &self,
        window_offset: Vec2,
        center: Vec2,
        extent: Vec2,
    ) -> Vec<SharedSprite> {
        self.collect(|sprite| {
            let guard = sprite.read();
            guard.base().visible() && guard.base().render_intersects(window_offset, center, extent)
        })
    }

    /// Screen-space intersection that ignores visibility. Hit-testing tools
    /// use this to find hidden or queued sprites too.
    pub fn render_intersections_even_invisible(
        &self,
        window_offset: Vec2,
        center: Vec2,
        extent: Vec2,
    ) -> Vec<SharedSprite> {
        self.collect(|sprite| {
            sprite
                .read()
                .base()
                .render_intersects(window_offset, center, extent)
        })
    }

    fn collect(&self, matches: impl Fn(&SharedSprite) -> bool) -> Vec<SharedSprite> {
        self.live
            .read()
            .iter()
            .filter(|sprite| matches(sprite))
            .cloned()
            .collect()
    }

    // -- rendering -----------------------------------------------------------

    /// Draw list for one frame: visible sprites culled to the viewport,
    /// sorted by ascending z-order, with the player forced last so nothing
    /// draws over it.
    pub fn render_order(&self, window_offset: Vec2, viewport_extent: Vec2) -> Vec<SharedSprite> {
        let viewport_center = viewport_extent * 0.5;
        let player_id = self
            .player()
            .map(|player| player.read().base().id());

        let mut ordered: Vec<SharedSprite> = self.collect(|sprite| {
            let guard = sprite.read();
            guard.base().visible()
                && guard
                    .base()
                    .render_intersects(window_offset, viewport_center, viewport_extent)
        });
        ordered.sort_by_key(|sprite| sprite.read().base().z_order());

        if let Some(player_id) = player_id {
            if let Some(index) = ordered
                .iter()
                .position(|sprite| sprite.read().base().id() == player_id)
            {
                let player = ordered.remove(index);
                ordered.push(player);
            }
        }
        ordered
    }

    /// Drops every sprite, live and pending, without running cleanup hooks.
    /// Part of engine disposal, not a gameplay operation.
    pub fn clear(&self) {
        self.live.write().clear();
        self.pending.lock().clear();
        *self.player.write() = None;
    }

    // -- diagnostics ---------------------------------------------------------

    /// Runs `f` against the raw live set under its read lock. For debug
    /// tooling that needs a consistent view without cloning.
    pub fn debug_access<R>(&self, f: impl FnOnce(&[SharedSprite]) -> R) -> R {
        f(&self.live.read())
    }
}

impl Default for SpriteCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::kinds::{DrifterSprite, PlayerSprite, TextSprite};
    use crate::sprite::{share, Sprite};

    fn drifter(collection: &SpriteCollection, tag: &str) -> SharedSprite {
        let mut sprite = DrifterSprite::new(collection.allocate_id());
        sprite.base_mut().set_tag(tag);
        share(sprite)
    }

    // -- 1. insertion is deferred -------------------------------------------

    #[test]
    fn insert_is_invisible_until_pending_applied() {
        let collection = SpriteCollection::new();
        collection.insert(drifter(&collection, "a"));
        assert_eq!(collection.len(), 0, "insert must not take effect mid-tick");
        assert_eq!(collection.pending_count(), 1);

        assert_eq!(collection.apply_pending_inserts(), 1);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.pending_count(), 0);
    }

    #[test]
    fn hydration_drops_inserts() {
        let collection = SpriteCollection::new();
        collection.set_hydrating(true);
        collection.insert(drifter(&collection, "a"));
        collection.set_hydrating(false);
        assert_eq!(collection.pending_count(), 0);
        assert_eq!(collection.apply_pending_inserts(), 0);
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let collection = SpriteCollection::new();
        let a = collection.allocate_id();
        let b = collection.allocate_id();
        assert!(b > a);
    }

    // -- 2. two-phase deletion ----------------------------------------------

    #[test]
    fn queued_sprites_survive_until_the_sweep() {
        let collection = SpriteCollection::new();
        collection.insert(drifter(&collection, "doomed"));
        collection.apply_pending_inserts();

        assert_eq!(collection.queue_for_deletion_by_tag("doomed"), 1);
        assert_eq!(collection.len(), 1, "still present before the sweep");
        assert!(collection.visible().is_empty(), "but no longer visible");

        assert_eq!(collection.sweep_deletions(), 1);
        assert_eq!(collection.len(), 0);
    }

    #[test]
    fn tag_deletion_reaches_pending_inserts() {
        let collection = SpriteCollection::new();
        collection.insert(drifter(&collection, "doomed"));
        // Marked while still pending: the sprite must never materialize.
        assert_eq!(collection.queue_for_deletion_by_tag("doomed"), 1);
        assert_eq!(collection.sweep_deletions(), 1);
        assert_eq!(collection.apply_pending_inserts(), 0);
        assert_eq!(collection.len(), 0);
    }

    #[test]
    fn deletion_by_owner() {
        let collection = SpriteCollection::new();
        let parent = drifter(&collection, "parent");
        let parent_id = parent.read().base().id();
        collection.insert(parent);
        for _ in 0..3 {
            let child = drifter(&collection, "child");
            child.write().base_mut().set_owner(parent_id);
            collection.insert(child);
        }
        collection.apply_pending_inserts();

        assert_eq!(collection.queue_for_deletion_by_owner(parent_id), 3);
        collection.sweep_deletions();
        assert_eq!(collection.len(), 1, "only the parent remains");
    }

    #[test]
    fn deletion_by_id_and_unknown_id() {
        let collection = SpriteCollection::new();
        let sprite = drifter(&collection, "a");
        let id = sprite.read().base().id();
        collection.insert(sprite);
        collection.apply_pending_inserts();

        assert!(collection.queue_for_deletion(id));
        assert!(!collection.queue_for_deletion(9999));
        collection.sweep_deletions();
        assert!(collection.by_id(id).is_none());
    }

    #[test]
    fn action_sprite_reset_spares_player_and_text() {
        let collection = SpriteCollection::new();
        collection.set_player(share(PlayerSprite::new(collection.allocate_id())));
        collection.insert_now(share(TextSprite::new(collection.allocate_id(), "hud")));
        collection.insert(drifter(&collection, "enemy"));
        collection.apply_pending_inserts();

        assert_eq!(collection.queue_deletion_of_action_sprites(), 1);
        collection.sweep_deletions();
        assert_eq!(collection.len(), 2, "player and text must survive");
    }

    #[test]
    fn sweep_revives_a_dead_player_hidden() {
        let collection = SpriteCollection::new();
        let player = share(PlayerSprite::new(collection.allocate_id()));
        player.write().base_mut().set_visible(true);
        player.write().base_mut().mark_dead();
        collection.set_player(player.clone());

        collection.sweep_deletions();
        let guard = player.read();
        assert!(!guard.base().is_dead(), "sweep revives the player");
        assert!(!guard.base().visible(), "but leaves it hidden");
    }

    // -- 3. queries ----------------------------------------------------------

    #[test]
    fn tag_and_category_queries() {
        let collection = SpriteCollection::new();
        collection.insert(drifter(&collection, "alpha"));
        collection.insert(drifter(&collection, "alpha"));
        collection.insert_now(share(TextSprite::new(collection.allocate_id(), "hud")));
        collection.apply_pending_inserts();

        assert_eq!(collection.by_tag("alpha").len(), 2);
        assert!(collection.single_by_tag("alpha").is_none(), "ambiguous tag");
        assert_eq!(collection.of_category(SpriteCategory::Drifter).len(), 2);
        assert_eq!(collection.of_category(SpriteCategory::TextBlock).len(), 1);
    }

    #[test]
    fn intersection_queries_respect_visibility() {
        let collection = SpriteCollection::new();
        let sprite = drifter(&collection, "a");
        {
            let mut guard = sprite.write();
            guard.base_mut().set_location(Vec2::new(50.0, 50.0));
            guard.base_mut().set_size(Vec2::new(20.0, 20.0));
        }
        collection.insert(sprite.clone());
        collection.apply_pending_inserts();

        let probe = (Vec2::new(55.0, 55.0), Vec2::new(4.0, 4.0));
        assert_eq!(collection.intersections(probe.0, probe.1).len(), 1);

        sprite.write().base_mut().set_visible(false);
        assert!(collection.intersections(probe.0, probe.1).is_empty());
        assert_eq!(
            collection
                .render_intersections_even_invisible(Vec2::ZERO, probe.0, probe.1)
                .len(),
            1,
            "the even-invisible variant still finds it"
        );
    }

    #[test]
    fn intersections_with_excludes_the_subject() {
        let collection = SpriteCollection::new();
        let a = drifter(&collection, "a");
        let b = drifter(&collection, "b");
        for sprite in [&a, &b] {
            let mut guard = sprite.write();
            guard.base_mut().set_location(Vec2::new(10.0, 10.0));
            guard.base_mut().set_size(Vec2::new(8.0, 8.0));
        }
        collection.insert(a.clone());
        collection.insert(b);
        collection.apply_pending_inserts();

        let hits = collection.intersections_with(&a);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].read().base().tag(), "b");
    }

    // -- 4. render order -----------------------------------------------------

    #[test]
    fn render_order_sorts_by_z_with_player_last() {
        let collection = SpriteCollection::new();
        let player = share(PlayerSprite::new(collection.allocate_id()));
        player.write().base_mut().set_visible(true);
        player.write().base_mut().set_z_order(-10);
        collection.set_player(player);

        for (tag, z) in [("back", 0), ("front", 5)] {
            let sprite = drifter(&collection, tag);
            sprite.write().base_mut().set_z_order(z);
            sprite.write().base_mut().set_size(Vec2::new(4.0, 4.0));
            sprite
                .write()
                .base_mut()
                .set_location(Vec2::new(100.0, 100.0));
            collection.insert(sprite);
        }
        collection.apply_pending_inserts();

        let ordered = collection.render_order(Vec2::ZERO, Vec2::new(800.0, 600.0));
        let tags: Vec<String> = ordered
            .iter()
            .map(|sprite| sprite.read().base().tag().to_owned())
            .collect();
        assert_eq!(tags, ["back", "front", "player"], "player draws last despite lowest z");
    }

    #[test]
    fn render_order_culls_to_the_viewport() {
        let collection = SpriteCollection::new();
        let far = drifter(&collection, "far-away");
        far.write().base_mut().set_location(Vec2::new(5000.0, 5000.0));
        far.write().base_mut().set_size(Vec2::new(4.0, 4.0));
        collection.insert(far);
        collection.apply_pending_inserts();

        assert!(collection
            .render_order(Vec2::ZERO, Vec2::new(800.0, 600.0))
            .is_empty());
    }
}
