//! # Button Layouts
//!
//! Bytes 3-5 of an input report carry one bit per button. Both controllers
//! share the byte layout, but each side only has half of the buttons, so a
//! [`ButtonLayout`] is picked once per controller instead of branching on
//! the side for every field.
//!
//! | Byte | Bit 0 | Bit 1 | Bit 2 | Bit 3 | Bit 4 | Bit 5 | Bit 6 | Bit 7 |
//! |------|-------|-------|-------|-------|-------|-------|-------|-------|
//! | 3 | Y | X | B | A | SR (R) | SL (R) | R | ZR |
//! | 4 | Minus | Plus | R-Stick | L-Stick | Home | Capture | - | Grip |
//! | 5 | Down | Up | Right | Left | SR (L) | SL (L) | L | ZL |

use super::report::{BitField, RawReport, LEFT_STICK_OFFSET, RIGHT_STICK_OFFSET};
use super::state::{Buttons, LeftButtons, RightButtons, Side};

/// Every named button across both controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Y,
    X,
    B,
    A,
    RightSr,
    RightSl,
    R,
    Zr,
    Minus,
    Plus,
    RightStick,
    LeftStick,
    Home,
    Capture,
    ChargingGrip,
    Down,
    Up,
    Right,
    Left,
    LeftSr,
    LeftSl,
    L,
    Zl,
}

impl Button {
    /// Report position of this button
    pub const fn field(self) -> BitField {
        match self {
            Button::Y => BitField::flag(3, 0),
            Button::X => BitField::flag(3, 1),
            Button::B => BitField::flag(3, 2),
            Button::A => BitField::flag(3, 3),
            Button::RightSr => BitField::flag(3, 4),
            Button::RightSl => BitField::flag(3, 5),
            Button::R => BitField::flag(3, 6),
            Button::Zr => BitField::flag(3, 7),
            Button::Minus => BitField::flag(4, 0),
            Button::Plus => BitField::flag(4, 1),
            Button::RightStick => BitField::flag(4, 2),
            Button::LeftStick => BitField::flag(4, 3),
            Button::Home => BitField::flag(4, 4),
            Button::Capture => BitField::flag(4, 5),
            Button::ChargingGrip => BitField::flag(4, 7),
            Button::Down => BitField::flag(5, 0),
            Button::Up => BitField::flag(5, 1),
            Button::Right => BitField::flag(5, 2),
            Button::Left => BitField::flag(5, 3),
            Button::LeftSr => BitField::flag(5, 4),
            Button::LeftSl => BitField::flag(5, 5),
            Button::L => BitField::flag(5, 6),
            Button::Zl => BitField::flag(5, 7),
        }
    }
}

/// Side-specific report mapping
#[derive(Debug)]
pub struct ButtonLayout {
    pub side: Side,
    /// Offset of this side's packed stick triplet
    pub stick_offset: usize,
    decode_buttons: fn(&RawReport) -> Buttons,
}

impl ButtonLayout {
    pub fn for_side(side: Side) -> &'static ButtonLayout {
        match side {
            Side::Left => &LEFT_LAYOUT,
            Side::Right => &RIGHT_LAYOUT,
        }
    }

    #[inline]
    pub fn buttons(&self, report: &RawReport) -> Buttons {
        (self.decode_buttons)(report)
    }
}

pub static LEFT_LAYOUT: ButtonLayout = ButtonLayout {
    side: Side::Left,
    stick_offset: LEFT_STICK_OFFSET,
    decode_buttons: left_buttons,
};

pub static RIGHT_LAYOUT: ButtonLayout = ButtonLayout {
    side: Side::Right,
    stick_offset: RIGHT_STICK_OFFSET,
    decode_buttons: right_buttons,
};

fn left_buttons(report: &RawReport) -> Buttons {
    let pressed = |button: Button| report.flag(button.field());
    Buttons::Left(LeftButtons {
        down: pressed(Button::Down),
        up: pressed(Button::Up),
        right: pressed(Button::Right),
        left: pressed(Button::Left),
        sr: pressed(Button::LeftSr),
        sl: pressed(Button::LeftSl),
        l: pressed(Button::L),
        zl: pressed(Button::Zl),
        minus: pressed(Button::Minus),
        stick: pressed(Button::LeftStick),
        capture: pressed(Button::Capture),
    })
}

fn right_buttons(report: &RawReport) -> Buttons {
    let pressed = |button: Button| report.flag(button.field());
    Buttons::Right(RightButtons {
        y: pressed(Button::Y),
        x: pressed(Button::X),
        b: pressed(Button::B),
        a: pressed(Button::A),
        sr: pressed(Button::RightSr),
        sl: pressed(Button::RightSl),
        r: pressed(Button::R),
        zr: pressed(Button::Zr),
        plus: pressed(Button::Plus),
        stick: pressed(Button::RightStick),
        home: pressed(Button::Home),
    })
}
