use proptest::prelude::*;

#[allow(unused_macros)]
macro_rules! assert_eq_all {
    ($x:expr, $($y:expr),+ $(,)?) => {{
        let x = $x;
        $( assert_eq!(x, $y); )+
    }};
}

#[allow(dead_code)]
pub(super) fn assert_eq_iters<I: Iterator, J: Iterator<Item = I::Item>>(
    mut i: I,
    mut j: J,
) where
    I::Item: std::fmt::Debug + Eq, // same inferred for J::Item
{
    loop {
        match (i.next(), j.next()) {
            (None, None) => return,
            (a, b) => assert_eq!(a, b),
        }
    }
}

#[allow(dead_code)]
pub(super) fn assert_eq_iters_back<I, J>(i: I, j: J)
where
    I: DoubleEndedIterator,
    J: DoubleEndedIterator<Item = I::Item>,
    I::Item: std::fmt::Debug + Eq,
{
    assert_eq_iters(i.rev(), j.rev());
}

pub(super) type U16Pairs = Vec<(u16, u16)>;

pub(super) fn u16_pairs(
    keys: std::ops::Range<u16>,
    len: std::ops::Range<usize>,
) -> impl Strategy<Value = U16Pairs> {
    prop::collection::vec((keys, 0u16..1024u16), len)
}

#[allow(dead_code)]
pub(super) fn small_int_pairs() -> impl Strategy<Value = U16Pairs> {
    u16_pairs(0..1024, 0..512)
}

// dense keys, so lookups and removals hit often
#[allow(dead_code)]
pub(super) fn tiny_int_pairs() -> impl Strategy<Value = U16Pairs> {
    u16_pairs(0..64, 0..48)
}

pub(super) fn string_u16_pairs() -> impl Strategy<Value = Vec<(String, u16)>> {
    prop::collection::vec(("[a-z]{0,2}", 0u16..1024u16), 0..512)
}
