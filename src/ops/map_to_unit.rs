use crate::ops::map::MapOp;

/// A stream that forgets its values and keeps only their timing.
pub type MapToUnitOp<S, Item> = MapOp<S, fn(Item), Item>;

#[inline]
pub(crate) fn to_unit<Item>(_: Item) {}
