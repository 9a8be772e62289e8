//! Simulated dual-bank flash and boot controller
//!
//! Host-side stand-in for the STM32L4 flash controller. It behaves like the
//! hardware where it matters for the shim:
//!
//! - erased bytes read `0xFF`
//! - programming a double-word that is not erased is rejected
//! - every mutating call fails while the control register is locked
//! - the executing bank is mapped at `ACTIVE_BANK_BASE`, the other one at
//!   `INACTIVE_BANK_BASE`
//!
//! Only pages that have been touched are kept in memory. Faults can be
//! injected to exercise the error paths.

use heapless::Vec;
use lorashim_hal::{Bank, BootControl, FlashControl, FlashError};

use crate::flash::layout::{
    ACTIVE_BANK_BASE, BANK_SIZE, DOUBLE_WORD, ERASED_BYTE, ERASED_DOUBLE_WORD, FLASH_END,
    PAGES_PER_BANK, PAGE_SIZE,
};

/// Pages the simulator can hold in memory
pub const SIM_RESIDENT_PAGES: usize = 48;

/// Injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `unlock` fails
    RejectUnlock,
    /// `erase_page` fails for this page
    RejectErase { bank: Bank, page: u16 },
    /// `erase_bank` fails
    RejectBankErase,
    /// `program_double_word` fails at this address
    RejectProgram { address: u32 },
    /// `program_double_word` succeeds but stores a corrupted value
    CorruptProgram { address: u32 },
    /// Every `program_double_word` fails
    RejectAllPrograms,
}

struct ArmedFault {
    fault: Fault,
    /// Remaining hits, `None` for a permanent fault
    remaining: Option<u8>,
}

struct SimPage {
    bank: Bank,
    page: u16,
    erases: u32,
    bytes: [u8; PAGE_SIZE],
}

/// Simulated flash controller
pub struct SimFlash {
    active: Bank,
    locked: bool,
    pages: Vec<SimPage, SIM_RESIDENT_PAGES>,
    faults: Vec<ArmedFault, 8>,
    bank_erases: u32,
    programs: u32,
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFlash {
    /// Fully erased flash executing from bank 1
    pub fn new() -> Self {
        Self::with_active(Bank::Bank1)
    }

    /// Fully erased flash executing from `active`
    pub fn with_active(active: Bank) -> Self {
        Self {
            active,
            locked: true,
            pages: Vec::new(),
            faults: Vec::new(),
            bank_erases: 0,
            programs: 0,
        }
    }

    /// Inject a permanent fault
    pub fn inject(&mut self, fault: Fault) {
        self.arm(fault, None);
    }

    /// Inject a fault that triggers `times` times, then clears
    pub fn inject_times(&mut self, fault: Fault, times: u8) {
        self.arm(fault, Some(times));
    }

    fn arm(&mut self, fault: Fault, remaining: Option<u8>) {
        if self.faults.push(ArmedFault { fault, remaining }).is_err() {
            panic!("SimFlash: too many injected faults");
        }
    }

    /// Write page contents directly, bypassing erase rules
    pub fn fill_page(&mut self, bank: Bank, page: u16, byte_at: impl Fn(usize) -> u8) {
        let slot = self.page_mut(bank, page);
        for (i, byte) in slot.bytes.iter_mut().enumerate() {
            *byte = byte_at(i);
        }
    }

    /// Write raw bytes at a mapped address, bypassing erase rules
    pub fn poke(&mut self, address: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let (bank, page, offset) = self.decode(address + i as u32);
            self.page_mut(bank, page).bytes[offset] = *byte;
        }
    }

    /// How many times a page has been erased
    pub fn erase_count(&self, bank: Bank, page: u16) -> u32 {
        self.find(bank, page).map_or(0, |p| p.erases)
    }

    /// How many whole-bank erases ran
    pub fn bank_erase_count(&self) -> u32 {
        self.bank_erases
    }

    /// Successful double-word programs so far
    pub fn program_count(&self) -> u32 {
        self.programs
    }

    /// Whether the control register is locked
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Bank mapped at the execution address
    pub fn active_bank(&self) -> Bank {
        self.active
    }

    fn take_fault(&mut self, matches: impl Fn(&Fault) -> bool) -> bool {
        let Some(index) = self.faults.iter().position(|armed| matches(&armed.fault)) else {
            return false;
        };
        if let Some(remaining) = self.faults[index].remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.faults.swap_remove(index);
            }
        }
        true
    }

    /// Physical bank, page and byte offset of a mapped address
    fn decode(&self, address: u32) -> (Bank, u16, usize) {
        assert!(
            (ACTIVE_BANK_BASE..FLASH_END).contains(&address),
            "SimFlash: address {:#x} outside flash",
            address
        );
        let relative = address - ACTIVE_BANK_BASE;
        let bank = if relative < BANK_SIZE {
            self.active
        } else {
            self.active.other()
        };
        let in_bank = relative % BANK_SIZE;
        let page = (in_bank / PAGE_SIZE as u32) as u16;
        (bank, page, (in_bank % PAGE_SIZE as u32) as usize)
    }

    fn find(&self, bank: Bank, page: u16) -> Option<&SimPage> {
        self.pages.iter().find(|p| p.bank == bank && p.page == page)
    }

    fn page_mut(&mut self, bank: Bank, page: u16) -> &mut SimPage {
        let index = match self.pages.iter().position(|p| p.bank == bank && p.page == page) {
            Some(index) => index,
            None => {
                let fresh = SimPage {
                    bank,
                    page,
                    erases: 0,
                    bytes: [ERASED_BYTE; PAGE_SIZE],
                };
                if self.pages.push(fresh).is_err() {
                    panic!("SimFlash: more than {} resident pages", SIM_RESIDENT_PAGES);
                }
                self.pages.len() - 1
            }
        };
        &mut self.pages[index]
    }
}

impl FlashControl for SimFlash {
    fn unlock(&mut self) -> Result<(), FlashError> {
        if self.take_fault(|f| matches!(f, Fault::RejectUnlock)) {
            return Err(FlashError::Locked);
        }
        self.locked = false;
        Ok(())
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_page(&mut self, bank: Bank, page: u16) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if page >= PAGES_PER_BANK {
            return Err(FlashError::InvalidPage);
        }
        if self.take_fault(|f| *f == Fault::RejectErase { bank, page }) {
            return Err(FlashError::WriteProtected);
        }
        let slot = self.page_mut(bank, page);
        slot.bytes = [ERASED_BYTE; PAGE_SIZE];
        slot.erases += 1;
        Ok(())
    }

    fn erase_bank(&mut self, bank: Bank) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if self.take_fault(|f| matches!(f, Fault::RejectBankErase)) {
            return Err(FlashError::WriteProtected);
        }
        for slot in self.pages.iter_mut().filter(|p| p.bank == bank) {
            slot.bytes = [ERASED_BYTE; PAGE_SIZE];
            slot.erases += 1;
        }
        self.bank_erases += 1;
        Ok(())
    }

    fn program_double_word(&mut self, address: u32, value: u64) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if address as usize % DOUBLE_WORD != 0 {
            return Err(FlashError::Sequence);
        }
        if self.take_fault(|f| {
            *f == Fault::RejectProgram { address } || *f == Fault::RejectAllPrograms
        }) {
            return Err(FlashError::Sequence);
        }
        if self.read_double_word(address) != ERASED_DOUBLE_WORD {
            return Err(FlashError::NotErased);
        }

        let stored = if self.take_fault(|f| *f == Fault::CorruptProgram { address }) {
            value ^ 1
        } else {
            value
        };
        self.poke(address, &stored.to_le_bytes());
        self.programs += 1;
        Ok(())
    }

    fn read(&self, address: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let (bank, page, offset) = self.decode(address + i as u32);
            *byte = self.find(bank, page).map_or(ERASED_BYTE, |p| p.bytes[offset]);
        }
    }
}

/// Simulated boot controller
///
/// Tracks the persisted bank selection separately from the bank that is
/// executing, like the option bytes do until the next reset.
pub struct SimBoot {
    active: Bank,
    selected: Bank,
    write_protection_cleared: bool,
    reset_requested: bool,
    reject_toggle: bool,
    reject_protection_clear: bool,
}

impl SimBoot {
    /// Boot controller executing from `active`
    pub fn new(active: Bank) -> Self {
        Self {
            active,
            selected: active,
            write_protection_cleared: false,
            reset_requested: false,
            reject_toggle: false,
            reject_protection_clear: false,
        }
    }

    /// Make `toggle_boot_bank` fail
    pub fn reject_toggle(&mut self) {
        self.reject_toggle = true;
    }

    /// Make `clear_write_protection` fail
    pub fn reject_protection_clear(&mut self) {
        self.reject_protection_clear = true;
    }

    /// Bank the option bytes select for the next boot
    pub fn selected_bank(&self) -> Bank {
        self.selected
    }

    /// Whether a reset was requested
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Whether write protection was cleared
    pub fn write_protection_cleared(&self) -> bool {
        self.write_protection_cleared
    }
}

impl BootControl for SimBoot {
    fn active_bank(&self) -> Bank {
        self.active
    }

    fn clear_write_protection(&mut self) -> Result<(), FlashError> {
        if self.reject_protection_clear {
            return Err(FlashError::OptionBytes);
        }
        self.write_protection_cleared = true;
        Ok(())
    }

    fn toggle_boot_bank(&mut self) -> Result<(), FlashError> {
        if self.reject_toggle {
            return Err(FlashError::OptionBytes);
        }
        self.selected = self.selected.other();
        Ok(())
    }

    fn system_reset(&mut self) {
        self.reset_requested = true;
    }
}
