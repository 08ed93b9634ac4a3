//! Per-component accessors for source operands.

use crate::full::FullSrcRegister;
use crate::token::{ExtSwizzle, SrcRegister, SrcRegisterExtSwz, Swizzle};

fn check_component(component: usize) {
    assert!(component < 4, "component index {component} out of range");
}

pub fn get_src_register_swizzle(reg: &SrcRegister, component: usize) -> Swizzle {
    check_component(component);
    reg.swizzle[component]
}

pub fn set_src_register_swizzle(reg: &mut SrcRegister, swizzle: Swizzle, component: usize) {
    check_component(component);
    reg.swizzle[component] = swizzle;
}

pub fn get_src_register_extswizzle(reg: &SrcRegisterExtSwz, component: usize) -> ExtSwizzle {
    check_component(component);
    reg.ext_swizzle[component]
}

pub fn set_src_register_extswizzle(
    reg: &mut SrcRegisterExtSwz,
    swizzle: ExtSwizzle,
    component: usize,
) {
    check_component(component);
    reg.ext_swizzle[component] = swizzle;
}

pub fn get_src_register_extnegate(reg: &SrcRegisterExtSwz, component: usize) -> bool {
    check_component(component);
    reg.negate[component]
}

pub fn set_src_register_extnegate(reg: &mut SrcRegisterExtSwz, negate: bool, component: usize) {
    check_component(component);
    reg.negate[component] = negate;
}

/// The component (or constant) a full source operand finally reads for `component`.
///
/// The extended swizzle is applied first; a selected channel is then routed through the
/// simple swizzle.
pub fn get_full_src_register_extswizzle(reg: &FullSrcRegister, component: usize) -> ExtSwizzle {
    let ext = get_src_register_extswizzle(&reg.ext_swz, component);
    match ext.component() {
        Some(channel) => get_src_register_swizzle(&reg.register, channel as usize).into(),
        None => ext,
    }
}

/// Effective sign applied to one component of a source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignMode {
    /// `x`
    Keep,
    /// `-x`
    Toggle,
    /// `|x|`
    Clear,
    /// `-|x|`
    Set,
}

pub fn get_full_src_register_sign_mode(reg: &FullSrcRegister, component: usize) -> SignMode {
    let ext_negate = get_src_register_extnegate(&reg.ext_swz, component);
    if reg.ext_mod.absolute {
        if reg.ext_mod.negate {
            SignMode::Set
        } else {
            SignMode::Clear
        }
    } else if reg.register.negate ^ ext_negate ^ reg.ext_mod.negate {
        SignMode::Toggle
    } else {
        SignMode::Keep
    }
}

/// Rewrites the sign bits of `reg` so that every component has sign mode `mode`.
///
/// The mode is carried entirely by the modifier token's `Negate` and `Absolute` bits; the
/// register and per-component negations are cleared.
pub fn set_full_src_register_sign_mode(reg: &mut FullSrcRegister, mode: SignMode) {
    reg.register.negate = false;
    reg.ext_swz.negate = [false; 4];
    let (negate, absolute) = match mode {
        SignMode::Keep => (false, false),
        SignMode::Toggle => (true, false),
        SignMode::Clear => (false, true),
        SignMode::Set => (true, true),
    };
    reg.ext_mod.negate = negate;
    reg.ext_mod.absolute = absolute;
}

/// Rounds `addr` up to the next 16-byte boundary.
pub fn align_128bit(addr: usize) -> usize {
    (addr + 15) & !15
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RegisterFile;

    #[test]
    fn swizzle_accessors() {
        let mut reg = SrcRegister::default();
        set_src_register_swizzle(&mut reg, Swizzle::W, 0);
        assert_eq!(get_src_register_swizzle(&reg, 0), Swizzle::W);
        assert_eq!(reg.swizzle, [Swizzle::W, Swizzle::Y, Swizzle::Z, Swizzle::W]);

        let mut ext = SrcRegisterExtSwz::default();
        set_src_register_extswizzle(&mut ext, ExtSwizzle::One, 3);
        set_src_register_extnegate(&mut ext, true, 2);
        assert_eq!(get_src_register_extswizzle(&ext, 3), ExtSwizzle::One);
        assert!(get_src_register_extnegate(&ext, 2));
        assert!(!get_src_register_extnegate(&ext, 1));
    }

    #[test]
    #[should_panic(expected = "component index 4")]
    fn component_out_of_range_panics() {
        get_src_register_swizzle(&SrcRegister::default(), 4);
    }

    #[test]
    fn extswizzle_composes_through_simple_swizzle() {
        let mut reg = FullSrcRegister::new(RegisterFile::Temporary, 0);
        reg.register.swizzle = [Swizzle::Y, Swizzle::Z, Swizzle::X, Swizzle::W];
        reg.ext_swz.ext_swizzle = [ExtSwizzle::X, ExtSwizzle::Zero, ExtSwizzle::Z, ExtSwizzle::One];
        assert_eq!(get_full_src_register_extswizzle(&reg, 0), ExtSwizzle::Y);
        assert_eq!(get_full_src_register_extswizzle(&reg, 1), ExtSwizzle::Zero);
        assert_eq!(get_full_src_register_extswizzle(&reg, 2), ExtSwizzle::X);
        assert_eq!(get_full_src_register_extswizzle(&reg, 3), ExtSwizzle::One);
    }

    #[test]
    fn sign_mode_round_trips() {
        for mode in [SignMode::Keep, SignMode::Toggle, SignMode::Clear, SignMode::Set] {
            let mut reg = FullSrcRegister::new(RegisterFile::Input, 1);
            reg.ext_swz.negate = [true, false, true, false];
            reg.register.negate = true;
            set_full_src_register_sign_mode(&mut reg, mode);
            for component in 0..4 {
                assert_eq!(get_full_src_register_sign_mode(&reg, component), mode);
            }
        }
    }

    #[test]
    fn sign_bits_round_trip_through_sign_mode() {
        for (negate, absolute) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut reg = FullSrcRegister::new(RegisterFile::Input, 0);
            reg.ext_mod.negate = negate;
            reg.ext_mod.absolute = absolute;
            let mode = get_full_src_register_sign_mode(&reg, 0);
            set_full_src_register_sign_mode(&mut reg, mode);
            assert_eq!(
                (reg.ext_mod.negate, reg.ext_mod.absolute),
                (negate, absolute),
                "{mode:?}"
            );
        }
    }

    #[test]
    fn toggle_is_written_to_the_modifier_token() {
        let mut reg = FullSrcRegister::new(RegisterFile::Input, 0);
        reg.register.negate = true;
        set_full_src_register_sign_mode(&mut reg, SignMode::Toggle);
        assert!(!reg.register.negate);
        assert!(reg.ext_mod.negate);
        assert!(!reg.ext_mod.absolute);
    }

    #[test]
    fn negations_cancel() {
        let mut reg = FullSrcRegister::new(RegisterFile::Input, 0);
        reg.register.negate = true;
        reg.ext_mod.negate = true;
        reg.ext_swz.negate[1] = true;
        assert_eq!(get_full_src_register_sign_mode(&reg, 0), SignMode::Keep);
        assert_eq!(get_full_src_register_sign_mode(&reg, 1), SignMode::Toggle);
    }

    #[test]
    fn alignment() {
        assert_eq!(align_128bit(0), 0);
        assert_eq!(align_128bit(1), 16);
        assert_eq!(align_128bit(16), 16);
        assert_eq!(align_128bit(17), 32);
    }
}
