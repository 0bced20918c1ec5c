use castor3d_types::RawResourceHandle;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Vector whose removed slots are reused by later pushes.
///
/// Each removal bumps the slot's generation, so a handle to a removed value
/// stays dead after its slot is reused.
#[derive(Debug)]
pub struct FreelistVec<T> {
    data: Vec<Slot<T>>,
    freelist: Vec<usize>,
}

impl<T> FreelistVec<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            freelist: Vec::new(),
        }
    }

    pub fn push<K>(&mut self, value: T) -> RawResourceHandle<K> {
        if let Some(index) = self.freelist.pop() {
            let slot = &mut self.data[index];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            RawResourceHandle::with_generation(index, slot.generation)
        } else {
            let index = self.data.len();
            self.data.push(Slot {
                generation: 0,
                value: Some(value),
            });
            RawResourceHandle::new(index)
        }
    }

    pub fn remove<K>(&mut self, handle: RawResourceHandle<K>) -> Option<T> {
        let slot = self.data.get_mut(handle.idx)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.freelist.push(handle.idx);
        Some(value)
    }

    pub fn get<K>(&self, handle: RawResourceHandle<K>) -> Option<&T> {
        let slot = self.data.get(handle.idx)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut<K>(&mut self, handle: RawResourceHandle<K>) -> Option<&mut T> {
        let slot = self.data.get_mut(handle.idx)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.freelist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter<K>(&self) -> impl Iterator<Item = (RawResourceHandle<K>, &T)> {
        self.data.iter().enumerate().filter_map(|(idx, slot)| {
            let value = slot.value.as_ref()?;
            Some((RawResourceHandle::with_generation(idx, slot.generation), value))
        })
    }

    /// Removes every value, yielding them in index order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.freelist.clear();
        self.data.drain(..).filter_map(|slot| slot.value)
    }
}

impl<T> Default for FreelistVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::RawResourceHandle;

    use super::FreelistVec;

    struct Tag;
    type Handle = RawResourceHandle<Tag>;

    #[test]
    fn slots_are_reused() {
        let mut vec = FreelistVec::new();
        let a: Handle = vec.push("a");
        let b: Handle = vec.push("b");
        assert_eq!(vec.remove(a), Some("a"));
        assert_eq!(vec.remove(a), None);
        let c: Handle = vec.push("c");
        assert_eq!(c.idx, a.idx);
        assert_eq!(vec.get(b), Some(&"b"));
        assert_eq!(vec.len(), 2);
    }

    #[test]
    fn removed_handles_stay_dead() {
        let mut vec = FreelistVec::new();
        let a: Handle = vec.push("a");
        vec.remove(a);
        let b: Handle = vec.push("b");
        assert_ne!(a, b);
        assert_eq!(vec.get(a), None);
        assert_eq!(vec.get_mut(a), None);
        assert_eq!(vec.remove(a), None);
        assert_eq!(vec.get(b), Some(&"b"));
        assert_eq!(vec.iter::<Tag>().map(|(h, _)| h).collect::<Vec<_>>(), [b]);
    }
}
