use crate::smassert;

/// Returns min number which is >= `a` and aligned by `alignment`,
/// or `None` if there is no such `usize`.
pub fn checked_align_up(a: usize, alignment: usize) -> Option<usize> {
    smassert!(alignment.is_power_of_two());
    Some(a.checked_add(alignment - 1)? & !(alignment - 1))
}
