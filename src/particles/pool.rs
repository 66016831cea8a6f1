//! Fixed-capacity particle arena.
//!
//! Slots are allocated once. Spawning pops an index from the free list and
//! death pushes it back, so steady-state updates never touch the allocator.

use glam::Vec2;

/// One simulated particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Remaining life in `(0, 1]`. Only decreases until the slot is recycled.
    pub life: f32,
    /// Seconds a particle lives from `life = 1`.
    pub max_life: f32,
    pub size: f32,
    pub color: [f32; 3],
    pub mass: f32,
    /// Unique for the lifetime of the pool, never reused.
    pub id: u64,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            life: 1.0,
            max_life: 1.0,
            size: 1.0,
            color: [1.0; 3],
            mass: 1.0,
            id: 0,
        }
    }
}

/// Arena of particle slots with a free list and an active index list.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    free: Vec<u32>,
    active: Vec<u32>,
    next_id: u64,
}

impl ParticlePool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::default(); capacity],
            // Reversed so spawning hands out low indices first.
            free: (0..capacity as u32).rev().collect(),
            active: Vec::with_capacity(capacity),
            next_id: 0,
        }
    }

    /// Claim a slot for `particle`, assigning it a fresh id. Returns `None`
    /// when the pool is full.
    pub fn spawn(&mut self, mut particle: Particle) -> Option<u32> {
        let index = self.free.pop()?;
        particle.id = self.next_id;
        self.next_id += 1;
        self.slots[index as usize] = particle;
        self.active.push(index);
        Some(index)
    }

    /// Release the particle at `position` in the active list.
    ///
    /// Uses swap-remove: the last active index moves into `position`.
    pub fn release_active(&mut self, position: usize) {
        let index = self.active.swap_remove(position);
        self.free.push(index);
    }

    /// Release everything without touching capacity.
    pub fn clear(&mut self) {
        while let Some(index) = self.active.pop() {
            self.free.push(index);
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn alive(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Slot index of the `position`th active particle.
    #[inline]
    pub fn active_index(&self, position: usize) -> u32 {
        self.active[position]
    }

    #[inline]
    pub fn get(&self, index: u32) -> &Particle {
        &self.slots[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut Particle {
        &mut self.slots[index as usize]
    }

    /// Alive particles in active-list order.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.active.iter().map(move |&i| &self.slots[i as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_until_full() {
        let mut pool = ParticlePool::with_capacity(3);
        assert_eq!(pool.spawn(Particle::default()), Some(0));
        assert_eq!(pool.spawn(Particle::default()), Some(1));
        assert_eq!(pool.spawn(Particle::default()), Some(2));
        assert_eq!(pool.spawn(Particle::default()), None);
        assert_eq!(pool.alive(), 3);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_recycles_slot() {
        let mut pool = ParticlePool::with_capacity(2);
        pool.spawn(Particle::default());
        pool.spawn(Particle::default());
        pool.release_active(0);
        assert_eq!(pool.alive(), 1);
        assert_eq!(pool.active_index(0), 1);

        let index = pool.spawn(Particle::default()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(pool.get(index).id, 2);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut pool = ParticlePool::with_capacity(4);
        for _ in 0..4 {
            pool.spawn(Particle::default());
        }
        pool.clear();
        assert_eq!(pool.alive(), 0);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.capacity(), 4);
    }
}
