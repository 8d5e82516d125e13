use std::sync::Arc;

use crate::common::{PageId, RecordId, Slot};
use crate::storage::common::{Deserializer, Serializer};
use crate::tuple::schema::TupleDesc;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

/// Layout of a heap page: a bitmap with one bit per slot, telling whether
/// the slot is in use, followed by the fixed width tuple slots.
///
/// ```text
/// +----------------+---------+---------+-----+-------------+
/// | bitmap (B)     | slot 0  | slot 1  | ... | zero padding|
/// +----------------+---------+---------+-----+-------------+
/// ```
///
/// Every tuple costs its byte size plus one bitmap bit, so a page of `P` bytes
/// holds `floor(P * 8 / (tuple_size * 8 + 1))` slots. An all zero page is an
/// empty heap page.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapPageLayout {
    tuple_size: usize,
    slots: usize,
    header_size: usize,
}

impl HeapPageLayout {
    pub fn new(desc: &TupleDesc, page_size: usize) -> Self {
        let tuple_size = desc.byte_size();
        let slots = (page_size * 8) / (tuple_size * 8 + 1);
        let header_size = slots.div_ceil(8);

        Self {
            tuple_size,
            slots,
            header_size,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn is_slot_used(&self, data: &[u8], slot: usize) -> bool {
        let byte = data[slot / 8];
        let mask = 1 << (slot % 8);
        (byte & mask) != 0
    }

    fn mark_slot(&self, data: &mut [u8], slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            data[slot / 8] |= mask;
        } else {
            data[slot / 8] &= !mask;
        }
    }

    pub fn free_slots(&self, data: &[u8]) -> usize {
        (0..self.slots)
            .filter(|slot| !self.is_slot_used(data, *slot))
            .count()
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_size + slot * self.tuple_size;
        start..start + self.tuple_size
    }

    /// Stores the tuple in the first free slot. Returns `None` if the page is full.
    pub fn insert_tuple(&self, data: &mut [u8], tuple: &Tuple) -> Option<Slot> {
        let slot = (0..self.slots).find(|slot| !self.is_slot_used(data, *slot))?;

        let range = self.slot_range(slot);
        let mut serializer = Serializer::new(&mut data[range]);
        for value in tuple.values() {
            value.serialize_value(&mut serializer);
        }
        debug_assert_eq!(serializer.end(), self.tuple_size);
        self.mark_slot(data, slot, true);

        Some(slot as Slot)
    }

    /// Frees a slot and zeroes its content. Returns false if the slot was not in use.
    pub fn delete_tuple(&self, data: &mut [u8], slot: Slot) -> bool {
        let slot = slot as usize;
        if slot >= self.slots || !self.is_slot_used(data, slot) {
            return false;
        }
        self.mark_slot(data, slot, false);
        let range = self.slot_range(slot);
        data[range].fill(0);
        true
    }

    fn parse_tuple(&self, data: &[u8], slot: usize, desc: &Arc<TupleDesc>, page_id: PageId) -> Tuple {
        let mut deserializer = Deserializer::new(&data[self.slot_range(slot)]);
        let values = desc
            .fields()
            .iter()
            .map(|field| Value::parse_value(&mut deserializer, field.type_id()))
            .collect();
        Tuple::from_stored(
            Arc::clone(desc),
            values,
            RecordId::new(page_id, slot as Slot),
        )
    }

    /// Returns the tuple stored in a slot, if any.
    pub fn tuple(&self, data: &[u8], slot: Slot, desc: &Arc<TupleDesc>, page_id: PageId) -> Option<Tuple> {
        let slot = slot as usize;
        if slot >= self.slots || !self.is_slot_used(data, slot) {
            return None;
        }
        Some(self.parse_tuple(data, slot, desc, page_id))
    }

    /// Returns all stored tuples in slot order.
    pub fn tuples(&self, data: &[u8], desc: &Arc<TupleDesc>, page_id: PageId) -> Vec<Tuple> {
        (0..self.slots)
            .filter(|slot| self.is_slot_used(data, *slot))
            .map(|slot| self.parse_tuple(data, slot, desc, page_id))
            .collect()
    }
}
