//! The `Z80` CPU core: instruction-boundary state machine, interrupt
//! servicing, and the public `tick`/`reset`/`raise_int`/`raise_nmi` contract.

mod execute;

use g815_core::Bus;

use crate::microcode::MicroOp;
use crate::registers::Registers;

/// A single Z80 CPU core, decoding and executing the full base/CB/ED/DD/FD/
/// DDCB/FDCB opcode space one T-state at a time via [`g815_core::Cpu`].
pub struct Z80 {
    pub(crate) regs: Registers,
    ticks_remaining: u32,
    current_op: Option<MicroOp>,
    pending_nmi: bool,
    pending_int: Option<u8>,
    /// Set by EI; suppresses exactly one interrupt-acceptance check so the
    /// instruction immediately after EI always runs uninterrupted.
    ei_defer: bool,
    busrq: bool,
    busak: bool,
    strict: bool,
    last_unsupported: Option<(u8, u8)>,
    unsupported_hook: Option<Box<dyn FnMut(u8, u8)>>,
    extra_wait: u32,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            ticks_remaining: 0,
            current_op: None,
            pending_nmi: false,
            pending_int: None,
            ei_defer: false,
            busrq: false,
            busak: false,
            strict: false,
            last_unsupported: None,
            unsupported_hook: None,
            extra_wait: 0,
        }
    }

    /// Turn unsupported-opcode handling into a fatal panic instead of a NOP.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Install a callback invoked whenever the decoder hits an opcode it
    /// treats as NOP because it has no documented behavior. Given as
    /// `(prefix_marker, opcode)`: prefix_marker is 0x00 for the base space,
    /// or the last prefix byte (0xCB/0xED/0xDD/0xFD) otherwise.
    pub fn on_unsupported_opcode(&mut self, hook: impl FnMut(u8, u8) + 'static) {
        self.unsupported_hook = Some(Box::new(hook));
    }

    pub fn last_unsupported_opcode(&self) -> Option<(u8, u8)> {
        self.last_unsupported
    }

    pub fn current_micro_op(&self) -> Option<MicroOp> {
        self.current_op
    }

    /// T-states left to drain in the instruction currently in flight.
    pub fn t_state(&self) -> u32 {
        self.ticks_remaining
    }

    pub fn assert_busrq(&mut self, asserted: bool) {
        self.busrq = asserted;
        if !asserted {
            self.busak = false;
        }
    }

    pub fn is_busak(&self) -> bool {
        self.busak
    }

    fn push16(&mut self, bus: &mut dyn Bus, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write8(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write8(self.regs.sp, lo);
    }

    fn pop16(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = bus.read8(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read8(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_be_bytes([hi, lo])
    }

    fn bus_read8(&mut self, bus: &mut dyn Bus, addr: u16, kind: g815_core::CycleKind) -> u8 {
        self.extra_wait += u32::from(bus.wait_states(addr, kind));
        bus.read8(addr)
    }

    fn bus_write8(&mut self, bus: &mut dyn Bus, addr: u16, value: u8, kind: g815_core::CycleKind) {
        self.extra_wait += u32::from(bus.wait_states(addr, kind));
        bus.write8(addr, value);
    }

    fn bus_in8(&mut self, bus: &mut dyn Bus, port: u16) -> u8 {
        self.extra_wait += u32::from(bus.wait_states(port, g815_core::CycleKind::IoRead));
        bus.in8(port)
    }

    fn bus_out8(&mut self, bus: &mut dyn Bus, port: u16, value: u8) {
        self.extra_wait += u32::from(bus.wait_states(port, g815_core::CycleKind::IoWrite));
        bus.out8(port, value);
    }

    fn defer_next_interrupt(&mut self) {
        self.ei_defer = true;
    }

    fn note_unsupported(&mut self, prefix: u8, opcode: u8) {
        self.last_unsupported = Some((prefix, opcode));
        if let Some(hook) = self.unsupported_hook.as_mut() {
            hook(prefix, opcode);
        }
        assert!(
            !self.strict,
            "unsupported opcode {prefix:#04x}{opcode:02x} in strict mode"
        );
    }

    fn service_interrupts_and_step(&mut self, bus: &mut dyn Bus) {
        if self.pending_nmi {
            self.pending_nmi = false;
            self.regs.halted = false;
            self.regs.iff2 = self.regs.iff1;
            self.regs.iff1 = false;
            let pc = self.regs.pc;
            self.push16(bus, pc);
            self.regs.pc = 0x0066;
            self.current_op = Some(MicroOp::Internal);
            self.ticks_remaining = 11 - 1;
            return;
        }

        let deferred = self.ei_defer;
        self.ei_defer = false;
        if !deferred && self.regs.iff1 {
            if let Some(data) = self.pending_int.take() {
                self.regs.halted = false;
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                let pc = self.regs.pc;
                let total;
                match self.regs.im {
                    0 => {
                        self.push16(bus, pc);
                        self.regs.pc = (data & 0x38) as u16;
                        total = 13;
                    }
                    2 => {
                        self.push16(bus, pc);
                        let vector_addr = (((self.regs.i as u16) << 8) | data as u16) & 0xFFFE;
                        let lo = bus.read8(vector_addr);
                        let hi = bus.read8(vector_addr.wrapping_add(1));
                        self.regs.pc = u16::from_le_bytes([lo, hi]);
                        total = 19;
                    }
                    _ => {
                        self.push16(bus, pc);
                        self.regs.pc = 0x0038;
                        total = 13;
                    }
                }
                self.current_op = Some(MicroOp::Internal);
                self.ticks_remaining = total - 1;
                return;
            }
        }

        if self.regs.halted {
            bus.on_m1(self.regs.pc);
            self.regs.bump_r();
            self.current_op = Some(MicroOp::FetchRefresh);
            self.ticks_remaining = 4 - 1;
            return;
        }

        execute::step(self, bus);
    }

    pub fn tick(&mut self, bus: &mut dyn Bus) {
        if self.busrq {
            self.busak = true;
            return;
        }
        if self.ticks_remaining > 0 {
            self.ticks_remaining -= 1;
            self.current_op = Some(MicroOp::Internal);
            return;
        }
        self.service_interrupts_and_step(bus);
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn registers(&self) -> Registers {
        self.regs
    }

    pub fn is_halted(&self) -> bool {
        self.regs.halted
    }

    pub fn raise_int(&mut self, data_bus: u8) -> bool {
        self.pending_int = Some(data_bus);
        self.regs.iff1 && !self.ei_defer
    }

    pub fn raise_nmi(&mut self) {
        self.pending_nmi = true;
    }

    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.ticks_remaining = 0;
        self.current_op = None;
        self.pending_nmi = false;
        self.pending_int = None;
        self.ei_defer = false;
        self.busrq = false;
        self.busak = false;
    }

    #[cfg(feature = "test-utils")]
    pub fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    #[cfg(feature = "test-utils")]
    pub fn set_sp(&mut self, sp: u16) {
        self.regs.sp = sp;
    }
}

impl g815_core::Cpu for Z80 {
    type Registers = Registers;

    fn tick(&mut self, bus: &mut dyn Bus) {
        Z80::tick(self, bus);
    }

    fn pc(&self) -> u16 {
        Z80::pc(self)
    }

    fn registers(&self) -> Self::Registers {
        Z80::registers(self)
    }

    fn is_halted(&self) -> bool {
        Z80::is_halted(self)
    }

    fn raise_int(&mut self, data_bus: u8) -> bool {
        Z80::raise_int(self, data_bus)
    }

    fn raise_nmi(&mut self) {
        Z80::raise_nmi(self);
    }

    fn reset(&mut self) {
        Z80::reset(self);
    }
}

#[cfg(feature = "snapshot")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CpuState {
    pub registers: Registers,
    pub pending_nmi: bool,
    pub pending_int: Option<u8>,
    pub ei_defer: bool,
}

#[cfg(feature = "snapshot")]
impl Z80 {
    pub fn get_state(&self) -> CpuState {
        CpuState {
            registers: self.regs,
            pending_nmi: self.pending_nmi,
            pending_int: self.pending_int,
            ei_defer: self.ei_defer,
        }
    }

    pub fn load_state(&mut self, state: CpuState) {
        self.regs = state.registers;
        self.pending_nmi = state.pending_nmi;
        self.pending_int = state.pending_int;
        self.ei_defer = state.ei_defer;
        self.ticks_remaining = 0;
        self.current_op = None;
    }
}
