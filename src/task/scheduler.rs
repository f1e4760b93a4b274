use super::process::Process;
use super::{ContextSwitch, EntryPoint, Pid, ProcessError, ProcessState};
use crate::config::MAX_PROCESSES;
use crate::sync::SpinLock;

struct ProcessTable {
    slots: [Process; MAX_PROCESSES],
    /// Slots handed out so far. Also the next slot to hand out.
    count: usize,
    current: Option<usize>,
    /// Slot whose context is still executing after `terminate` moved
    /// `current` away from it. The next pass saves into it.
    handoff_from: Option<usize>,
    /// Scratch for the boot context abandoned by `start`.
    boot_stack_pointer: u64,
}

impl ProcessTable {
    const fn new() -> Self {
        Self {
            slots: [Process::EMPTY; MAX_PROCESSES],
            count: 0,
            current: None,
            handoff_from: None,
            boot_stack_pointer: 0,
        }
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(Process::reset);
        self.count = 0;
        self.current = None;
        self.handoff_from = None;
        self.boot_stack_pointer = 0;
    }

    fn live(&self) -> &[Process] {
        &self.slots[..self.count]
    }

    /// First READY slot after `from`, wrapping around and ending at `from`
    /// itself.
    fn next_ready_after(&self, from: usize) -> Option<usize> {
        (1..=self.count)
            .map(|step| (from + step) % self.count)
            .find(|&index| self.slots[index].is_ready())
    }

    /// Decide the next switch and commit it to the table.
    ///
    /// Returns where to save the outgoing stack pointer and the stack pointer
    /// to resume, or `None` when the running context keeps the CPU.
    fn plan_switch(&mut self) -> Option<(*mut u64, u64)> {
        let current = self.current?;
        if self.count < 2 {
            return None;
        }

        let outgoing = self.handoff_from.unwrap_or(current);
        let next = match self.handoff_from {
            Some(_) if self.slots[current].is_ready() => current,
            _ => self.next_ready_after(current)?,
        };
        if next == outgoing {
            return None;
        }

        self.handoff_from = None;
        self.current = Some(next);
        let resume = self.slots[next].stack_pointer;
        let save = &mut self.slots[outgoing].stack_pointer as *mut u64;
        Some((save, resume))
    }
}

/// Round-robin scheduler over a fixed table of `MAX_PROCESSES` slots.
///
/// Every operation takes the table lock for its bookkeeping only; the lock
/// is always released before `ContextSwitch::switch` runs, because control
/// may not come back to the caller for an arbitrary time and the resumed
/// process may enter the scheduler itself.
pub struct Scheduler<S: ContextSwitch> {
    table: SpinLock<ProcessTable>,
    arch: S,
}

impl<S: ContextSwitch> Scheduler<S> {
    pub const fn new(arch: S) -> Self {
        Self {
            table: SpinLock::new(ProcessTable::new()),
            arch,
        }
    }

    /// Clear the process table and reset its lock.
    pub fn init(&self) {
        // Safety: init runs before any process exists, so no guard is alive
        unsafe { self.table.force_unlock() };
        self.table.lock().reset();
    }

    /// Create a READY process that starts at `entry`.
    ///
    /// The first process ever created becomes current without a switch.
    /// A null entry or a full table leaves the table unchanged.
    pub fn create(&self, entry: Option<EntryPoint>) -> Result<Pid, ProcessError> {
        let entry = entry.ok_or(ProcessError::NullEntry)?;

        let mut table = self.table.lock();
        if table.count >= MAX_PROCESSES {
            log::warn!("process table full, dropping create request");
            return Err(ProcessError::TableFull);
        }

        let slot = table.count;
        let pid = Pid::new(slot as u32);
        table.slots[slot].prepare(pid, entry, &self.arch);
        table.count += 1;
        if table.current.is_none() {
            table.current = Some(slot);
        }

        log::debug!("created process {} at {:#x}", pid, entry as usize);
        Ok(pid)
    }

    /// Mark `pid` TERMINATED. Terminating an already terminated process
    /// succeeds without effect.
    ///
    /// When `pid` is current, "current" moves to the next READY slot but no
    /// switch happens here; the next `schedule()` transfers control.
    pub fn terminate(&self, pid: Pid) -> Result<(), ProcessError> {
        let mut table = self.table.lock();
        let index = pid.slot();
        if index >= table.count {
            return Err(ProcessError::NoSuchProcess(pid));
        }
        if table.slots[index].state == ProcessState::Terminated {
            return Ok(());
        }

        table.slots[index].state = ProcessState::Terminated;
        if table.current == Some(index) {
            if let Some(next) = table.next_ready_after(index) {
                table.current = Some(next);
                if table.handoff_from.is_none() {
                    table.handoff_from = Some(index);
                }
            }
        }

        log::debug!("terminated process {}", pid);
        Ok(())
    }

    /// Give the CPU to the next READY process after the current one, if
    /// there is one.
    pub fn schedule(&self) {
        let plan = self.table.lock().plan_switch();
        if let Some((save, resume)) = plan {
            // Safety: `save` points into a table slot, which lives as long as
            // the scheduler; the lock guard is already gone
            unsafe { self.arch.switch(save, resume) };
        }
    }

    /// Leave the boot context and enter the current process. Only returns
    /// if there is nothing to run, or if the boot context is resumed.
    ///
    /// The boot context belongs to no slot, so any pending hand-off left by
    /// an earlier `terminate` is dropped here.
    pub fn start(&self) -> Result<(), ProcessError> {
        let (save, resume) = {
            let mut table = self.table.lock();
            let current = table.current.ok_or(ProcessError::NothingToRun)?;
            let next = if table.slots[current].is_ready() {
                current
            } else {
                table
                    .next_ready_after(current)
                    .ok_or(ProcessError::NothingToRun)?
            };

            table.current = Some(next);
            table.handoff_from = None;
            let resume = table.slots[next].stack_pointer;
            (&mut table.boot_stack_pointer as *mut u64, resume)
        };

        log::info!("entering first process");
        unsafe { self.arch.switch(save, resume) };
        Ok(())
    }

    /// Terminate the current process and hand the CPU on.
    pub fn exit_current(&self) -> Result<Pid, ProcessError> {
        let pid = self.current_pid().ok_or(ProcessError::NothingToRun)?;
        self.terminate(pid)?;
        self.schedule();
        Ok(pid)
    }

    pub fn current_pid(&self) -> Option<Pid> {
        let table = self.table.lock();
        table.current.map(|index| table.slots[index].pid)
    }

    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        let table = self.table.lock();
        table.live().get(pid.slot()).map(Process::state)
    }

    pub fn process_count(&self) -> usize {
        self.table.with_lock(|table| table.count)
    }

    pub fn ready_count(&self) -> usize {
        self.table
            .with_lock(|table| table.live().iter().filter(|p| p.is_ready()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::context::INITIAL_RFLAGS;
    use core::cell::RefCell;

    const CODE: u16 = 0x08;
    const STACK: u16 = 0x10;
    const TRAMPOLINE: u64 = 0xFFFF_8000_DEAD_0000;

    /// Records switches instead of performing them. Each switch stores a
    /// distinct marker as the "saved" stack pointer.
    #[derive(Default)]
    struct RecordingSwitch {
        switches: RefCell<Vec<(usize, u64)>>,
    }

    impl RecordingSwitch {
        fn marker(n: usize) -> u64 {
            0x5A5A_0000 + n as u64
        }
    }

    impl ContextSwitch for RecordingSwitch {
        fn code_selector(&self) -> u16 {
            CODE
        }

        fn stack_selector(&self) -> u16 {
            STACK
        }

        fn return_trampoline(&self) -> u64 {
            TRAMPOLINE
        }

        unsafe fn switch(&self, save: *mut u64, resume: u64) {
            let mut switches = self.switches.borrow_mut();
            *save = Self::marker(switches.len());
            switches.push((save as usize, resume));
        }
    }

    extern "C" fn entry_a() {}
    extern "C" fn entry_b() {}
    extern "C" fn entry_c() {}

    fn scheduler() -> Box<Scheduler<RecordingSwitch>> {
        let scheduler = Box::new(Scheduler::new(RecordingSwitch::default()));
        scheduler.init();
        scheduler
    }

    fn switch_count(s: &Scheduler<RecordingSwitch>) -> usize {
        s.arch.switches.borrow().len()
    }

    fn slot_sp_addr(s: &Scheduler<RecordingSwitch>, slot: usize) -> usize {
        let table = s.table.lock();
        &table.slots[slot].stack_pointer as *const u64 as usize
    }

    fn slot_sp(s: &Scheduler<RecordingSwitch>, slot: usize) -> u64 {
        s.table.lock().slots[slot].stack_pointer
    }

    #[test]
    fn test_pids_increase_and_start_ready() {
        let s = scheduler();
        let pids: Vec<Pid> = (0..5).map(|_| s.create(Some(entry_a)).unwrap()).collect();

        assert!(pids.windows(2).all(|w| w[0] < w[1]));
        for pid in &pids {
            assert_eq!(s.state_of(*pid), Some(ProcessState::Ready));
        }
        assert_eq!(s.process_count(), 5);
        assert_eq!(s.current_pid(), Some(pids[0]));
        assert_eq!(switch_count(&s), 0);
    }

    #[test]
    fn test_create_past_capacity_is_rejected() {
        let s = scheduler();
        for _ in 0..MAX_PROCESSES {
            s.create(Some(entry_a)).unwrap();
        }
        assert_eq!(s.create(Some(entry_b)), Err(ProcessError::TableFull));
        assert_eq!(s.process_count(), MAX_PROCESSES);
    }

    #[test]
    fn test_null_entry_is_rejected() {
        let s = scheduler();
        assert_eq!(s.create(None), Err(ProcessError::NullEntry));
        assert_eq!(s.process_count(), 0);
        assert_eq!(s.current_pid(), None);
    }

    #[test]
    fn test_synthetic_frame_matches_switch_layout() {
        let s = scheduler();
        s.create(Some(entry_a)).unwrap();

        let table = s.table.lock();
        let process = &table.slots[0];
        let frame = process.initial_frame();
        let top = process.stack().top();

        assert_eq!(process.stack_pointer() % 16, 0);
        assert_eq!(process.base_pointer(), 0);
        assert_eq!(frame.rip, entry_a as usize as u64);
        assert_eq!(frame.cs, CODE as u64);
        assert_eq!(frame.ss, STACK as u64);
        assert_eq!(frame.rflags, INITIAL_RFLAGS);
        assert_eq!(frame.rsp, top - 8);
        let general = [
            frame.r15, frame.r14, frame.r13, frame.r12, frame.r11, frame.r10, frame.r9,
            frame.r8, frame.rdi, frame.rsi, frame.rbp, frame.rdx, frame.rcx, frame.rbx,
            frame.rax,
        ];
        assert!(general.iter().all(|&r| r == 0));

        let return_slot = unsafe { core::ptr::read(frame.rsp as *const u64) };
        assert_eq!(return_slot, TRAMPOLINE);
    }

    #[test]
    fn test_single_process_never_switches() {
        let s = scheduler();
        let pid = s.create(Some(entry_a)).unwrap();
        for _ in 0..3 {
            s.schedule();
        }
        assert_eq!(switch_count(&s), 0);
        assert_eq!(s.current_pid(), Some(pid));
    }

    #[test]
    fn test_schedule_without_processes_is_noop() {
        let s = scheduler();
        s.schedule();
        assert_eq!(switch_count(&s), 0);
    }

    #[test]
    fn test_round_robin_alternates() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();
        let first_b = slot_sp(&s, 1);

        let mut order = vec![s.current_pid().unwrap()];
        for _ in 0..4 {
            s.schedule();
            order.push(s.current_pid().unwrap());
        }
        assert_eq!(order, vec![a, b, a, b, a]);

        let switches = s.arch.switches.borrow();
        assert_eq!(switches.len(), 4);
        // A -> B enters B's synthetic frame, B -> A resumes what A saved
        assert_eq!(switches[0], (slot_sp_addr(&s, 0), first_b));
        assert_eq!(switches[1], (slot_sp_addr(&s, 1), RecordingSwitch::marker(0)));
        assert_eq!(switches[2], (slot_sp_addr(&s, 0), RecordingSwitch::marker(1)));
    }

    #[test]
    fn test_round_robin_skips_terminated() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();
        let c = s.create(Some(entry_c)).unwrap();
        s.terminate(b).unwrap();

        s.schedule();
        assert_eq!(s.current_pid(), Some(c));
        s.schedule();
        assert_eq!(s.current_pid(), Some(a));
    }

    #[test]
    fn test_terminating_other_process_only_changes_its_state() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();

        s.terminate(b).unwrap();
        assert_eq!(s.state_of(b), Some(ProcessState::Terminated));
        assert_eq!(s.state_of(a), Some(ProcessState::Ready));
        assert_eq!(s.current_pid(), Some(a));
        assert_eq!(switch_count(&s), 0);
    }

    #[test]
    fn test_terminating_last_ready_process_stops_scheduling() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();
        s.terminate(b).unwrap();
        s.terminate(a).unwrap();

        assert_eq!(s.current_pid(), Some(a));
        for _ in 0..4 {
            s.schedule();
        }
        assert_eq!(switch_count(&s), 0);
        assert_eq!(s.ready_count(), 0);
    }

    #[test]
    fn test_self_termination_hands_off_on_next_pass() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();
        let b_frame = slot_sp(&s, 1);

        s.terminate(a).unwrap();
        assert_eq!(s.current_pid(), Some(b));
        assert_eq!(switch_count(&s), 0);

        s.schedule();
        {
            let switches = s.arch.switches.borrow();
            assert_eq!(switches.len(), 1);
            // A's context is the one executing, so it is saved into A's slot
            assert_eq!(switches[0], (slot_sp_addr(&s, 0), b_frame));
        }
        assert_eq!(s.current_pid(), Some(b));

        // B is alone now
        s.schedule();
        assert_eq!(switch_count(&s), 1);
    }

    #[test]
    fn test_terminate_validates_pid() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let ghost = Pid::new(7);
        assert_eq!(s.terminate(ghost), Err(ProcessError::NoSuchProcess(ghost)));
        assert_eq!(s.state_of(ghost), None);

        s.terminate(a).unwrap();
        assert_eq!(s.terminate(a), Ok(()));
    }

    #[test]
    fn test_exit_current_switches_away() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();

        assert_eq!(s.exit_current(), Ok(a));
        assert_eq!(s.state_of(a), Some(ProcessState::Terminated));
        assert_eq!(s.current_pid(), Some(b));
        assert_eq!(switch_count(&s), 1);
    }

    #[test]
    fn test_start_enters_current_process() {
        let s = scheduler();
        assert_eq!(s.start(), Err(ProcessError::NothingToRun));

        s.create(Some(entry_a)).unwrap();
        let frame = slot_sp(&s, 0);
        s.start().unwrap();

        let switches = s.arch.switches.borrow();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].1, frame);
        // the boot context is not saved into any slot
        assert_ne!(switches[0].0, slot_sp_addr(&s, 0));
        assert_eq!(slot_sp(&s, 0), frame);
    }

    #[test]
    fn test_start_after_terminating_first_process_enters_next() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        let b = s.create(Some(entry_b)).unwrap();
        let b_frame = slot_sp(&s, 1);
        let a_frame = slot_sp(&s, 0);

        s.terminate(a).unwrap();
        s.start().unwrap();
        assert_eq!(s.current_pid(), Some(b));

        // B runs alone, nothing of it may be saved into A's slot
        s.schedule();
        let switches = s.arch.switches.borrow();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].1, b_frame);
        assert_ne!(switches[0].0, slot_sp_addr(&s, 0));
        assert_eq!(slot_sp(&s, 0), a_frame);
    }

    #[test]
    fn test_start_refuses_terminated_process() {
        let s = scheduler();
        let a = s.create(Some(entry_a)).unwrap();
        s.terminate(a).unwrap();

        assert_eq!(s.start(), Err(ProcessError::NothingToRun));
        assert_eq!(switch_count(&s), 0);
    }

    #[test]
    fn test_init_clears_table() {
        let s = scheduler();
        s.create(Some(entry_a)).unwrap();
        s.create(Some(entry_b)).unwrap();
        s.init();
        assert_eq!(s.process_count(), 0);
        assert_eq!(s.current_pid(), None);
        assert_eq!(s.create(Some(entry_c)), Ok(Pid::new(0)));
    }
}
