//! Reception buffer of the PDCP receiving entity
//!
//! Holds SDUs received out of order, keyed by COUNT. Two backings share the
//! same interface: a ring of `window_size` slots indexed by `COUNT % size` for
//! 12 bit SNs, and an ordered map for 18 bit SNs where a 131072 slot ring
//! would mostly sit empty. Buffered COUNTs always lie in
//! `[RX_DELIV, RX_DELIV + window_size)` so ring slots never collide.

use std::collections::BTreeMap;

use bytes::Bytes;
use common::types::SnSize;
use tracing::warn;

/// Fixed ring of slots, one per COUNT in the window
#[derive(Debug)]
pub struct RingWindow {
    slots: Vec<Option<(u32, Bytes)>>,
    len: usize,
}

impl RingWindow {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
            len: 0,
        }
    }

    fn index(&self, count: u32) -> usize {
        count as usize % self.slots.len()
    }

    fn insert(&mut self, count: u32, sdu: Bytes) -> bool {
        let idx = self.index(count);
        match &self.slots[idx] {
            Some((c, _)) if *c == count => false,
            Some((c, _)) => {
                warn!("Reception window slot of COUNT={} held by COUNT={}", count, c);
                false
            }
            None => {
                self.slots[idx] = Some((count, sdu));
                self.len += 1;
                true
            }
        }
    }

    fn contains(&self, count: u32) -> bool {
        matches!(&self.slots[self.index(count)], Some((c, _)) if *c == count)
    }

    fn remove(&mut self, count: u32) -> Option<Bytes> {
        let idx = self.index(count);
        match self.slots[idx].take() {
            Some((c, sdu)) if c == count => {
                self.len -= 1;
                Some(sdu)
            }
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }
}

/// Ordered map backing
#[derive(Debug)]
pub struct MapWindow {
    entries: BTreeMap<u32, Bytes>,
    size: usize,
}

impl MapWindow {
    pub fn new(size: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            size,
        }
    }
}

/// Reception buffer, backing chosen by SN size
#[derive(Debug)]
pub enum RxWindow {
    Ring(RingWindow),
    Map(MapWindow),
}

impl RxWindow {
    /// Create the backing suited to `sn_size`
    pub fn new(sn_size: SnSize) -> Self {
        let size = sn_size.window_size() as usize;
        match sn_size {
            SnSize::Size12 => RxWindow::Ring(RingWindow::new(size)),
            SnSize::Size18 => RxWindow::Map(MapWindow::new(size)),
        }
    }

    /// Store an SDU, false if `count` is already present
    pub fn insert(&mut self, count: u32, sdu: Bytes) -> bool {
        match self {
            RxWindow::Ring(ring) => ring.insert(count, sdu),
            RxWindow::Map(map) => {
                if map.entries.contains_key(&count) {
                    return false;
                }
                map.entries.insert(count, sdu);
                true
            }
        }
    }

    pub fn contains(&self, count: u32) -> bool {
        match self {
            RxWindow::Ring(ring) => ring.contains(count),
            RxWindow::Map(map) => map.entries.contains_key(&count),
        }
    }

    pub fn remove(&mut self, count: u32) -> Option<Bytes> {
        match self {
            RxWindow::Ring(ring) => ring.remove(count),
            RxWindow::Map(map) => map.entries.remove(&count),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RxWindow::Ring(ring) => ring.len,
            RxWindow::Map(map) => map.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once every COUNT of the window is buffered
    pub fn is_full(&self) -> bool {
        match self {
            RxWindow::Ring(ring) => ring.len == ring.slots.len(),
            RxWindow::Map(map) => map.entries.len() >= map.size,
        }
    }

    /// Drop all buffered SDUs
    pub fn clear(&mut self) {
        match self {
            RxWindow::Ring(ring) => ring.clear(),
            RxWindow::Map(map) => map.entries.clear(),
        }
    }

    /// Remove every entry with COUNT in `[from, until)` in ascending order
    ///
    /// No entry may be buffered below `from`.
    pub fn take_below(&mut self, from: u32, until: u32, mut f: impl FnMut(u32, Bytes)) {
        match self {
            RxWindow::Ring(ring) => {
                for count in from..until {
                    if ring.len == 0 {
                        break;
                    }
                    if let Some(sdu) = ring.remove(count) {
                        f(count, sdu);
                    }
                }
            }
            RxWindow::Map(map) => {
                while let Some(entry) = map.entries.first_entry() {
                    if *entry.key() >= until {
                        break;
                    }
                    let (count, sdu) = entry.remove_entry();
                    f(count, sdu);
                }
            }
        }
    }

    /// Remove consecutive entries starting at `from`, returns the first missing COUNT
    pub fn take_consecutive(&mut self, from: u32, mut f: impl FnMut(u32, Bytes)) -> u32 {
        let mut next = from;
        while let Some(sdu) = self.remove(next) {
            f(next, sdu);
            next = next.wrapping_add(1);
        }
        next
    }
}
