//! Resource node claims - at most one gatherer per tree or rock

use std::collections::HashMap;

use hecs::Entity;

/// Exclusive node -> villager claim set
#[derive(Debug, Clone, Default)]
pub struct ResourceClaims {
    claims: HashMap<Entity, Entity>,
}

impl ResourceClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `node` for `villager`. Fails if someone else holds it.
    pub fn claim(&mut self, node: Entity, villager: Entity) -> bool {
        match self.claims.get(&node) {
            Some(&holder) => holder == villager,
            None => {
                self.claims.insert(node, villager);
                log::debug!("{:?} claimed node {:?}", villager, node);
                true
            }
        }
    }

    /// Release `node` if `villager` holds it
    pub fn release(&mut self, node: Entity, villager: Entity) -> bool {
        if self.claims.get(&node) == Some(&villager) {
            self.claims.remove(&node);
            log::debug!("{:?} released node {:?}", villager, node);
            true
        } else {
            false
        }
    }

    /// Drop every claim held by `villager`
    pub fn release_all(&mut self, villager: Entity) {
        self.claims.retain(|_, holder| *holder != villager);
    }

    /// Drop the claim on a node that no longer exists
    pub fn forget_node(&mut self, node: Entity) {
        self.claims.remove(&node);
    }

    /// Claimed by anyone other than `villager`
    pub fn is_claimed_by_other(&self, node: Entity, villager: Entity) -> bool {
        matches!(self.claims.get(&node), Some(&holder) if holder != villager)
    }

    pub fn holder(&self, node: Entity) -> Option<Entity> {
        self.claims.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_claim_is_exclusive() {
        let mut world = World::new();
        let node = world.spawn(());
        let a = world.spawn(());
        let b = world.spawn(());
        let mut claims = ResourceClaims::new();

        assert!(claims.claim(node, a));
        assert!(claims.claim(node, a));
        assert!(!claims.claim(node, b));
        assert!(claims.is_claimed_by_other(node, b));
        assert!(!claims.is_claimed_by_other(node, a));

        assert!(!claims.release(node, b));
        assert!(claims.release(node, a));
        assert!(claims.claim(node, b));
    }

    #[test]
    fn test_release_all() {
        let mut world = World::new();
        let n1 = world.spawn(());
        let n2 = world.spawn(());
        let a = world.spawn(());
        let b = world.spawn(());
        let mut claims = ResourceClaims::new();
        claims.claim(n1, a);
        claims.claim(n2, b);

        claims.release_all(a);
        assert_eq!(claims.holder(n1), None);
        assert_eq!(claims.holder(n2), Some(b));
        assert_eq!(claims.len(), 1);
    }
}
