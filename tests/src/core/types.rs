use drc_core::types::*;
use proptest::prelude::*;

const ALL_CONDS: [Cond; 18] = [
    Cond::Never,
    Cond::Always,
    Cond::Eq,
    Cond::Ne,
    Cond::Lt,
    Cond::Ge,
    Cond::Le,
    Cond::Gt,
    Cond::Ltu,
    Cond::Geu,
    Cond::Leu,
    Cond::Gtu,
    Cond::Neg,
    Cond::Pos,
    Cond::Ov,
    Cond::NoOv,
    Cond::Unord,
    Cond::Ord,
];

#[test]
fn type_masks() {
    assert_eq!(Type::I32.mask(), 0xffff_ffff);
    assert_eq!(Type::F32.mask(), 0xffff_ffff);
    assert_eq!(Type::I64.mask(), u64::MAX);
    assert_eq!(Type::F64.size_bytes(), 8);
    assert!(Type::F32.is_float());
    assert!(!Type::I64.is_float());
}

#[test]
fn mem_size_bytes() {
    for s in MemSize::ALL {
        assert_eq!(MemSize::from_bytes(s.bytes()), Some(s));
    }
    assert_eq!(MemSize::from_bytes(3), None);
    assert_eq!(MemSize::Half.mask(), 0xffff);
}

#[test]
fn cond_invert_is_involution() {
    for c in ALL_CONDS {
        assert_eq!(c.invert().invert(), c);
    }
}

#[test]
fn unsigned_conditions() {
    // After `cmp 1, 2`: borrow set, not zero.
    let f = flags::C | flags::S;
    assert!(Cond::Ltu.holds(f));
    assert!(Cond::Leu.holds(f));
    assert!(!Cond::Gtu.holds(f));
    assert!(!Cond::Eq.holds(f));
}

#[test]
fn round_modes() {
    assert_eq!(RoundMode::Nearest.apply(2.5), 2.0);
    assert_eq!(RoundMode::Nearest.apply(3.5), 4.0);
    assert_eq!(RoundMode::Nearest.apply(-2.5), -2.0);
    assert_eq!(RoundMode::Nearest.apply(1.4), 1.0);
    assert_eq!(RoundMode::Trunc.apply(-1.7), -1.0);
    assert_eq!(RoundMode::Ceil.apply(1.1), 2.0);
    assert_eq!(RoundMode::Floor.apply(-1.1), -2.0);
    assert_eq!(RoundMode::from_bits(7), RoundMode::Floor);
}

proptest! {
    #[test]
    fn inverted_condition_disagrees(f in 0u8..32, i in 0usize..18) {
        let c = ALL_CONDS[i];
        prop_assert_ne!(c.holds(f), c.invert().holds(f));
    }
}
