//! Threading corpus scenarios.
//!
//! Each scenario is a small multi-threaded program written against a
//! [`Runtime`]. It prints to a captured console and finishes with an exit
//! code, so its observable behavior can be compared against a fixture.
//! Sleeps in the programs are shortened to [`TICK`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pthread_rs_core::errno::ENOTSUP;
use pthread_rs_core::error::errno_of;
use pthread_rs_core::pthread::{PTHREAD_MUTEX_DEFAULT, PTHREAD_MUTEX_ERRORCHECK};
use pthread_rs_core::{
    Destructor, MutexAttr, MutexKind, OnceControl, Result, Runtime, ThreadError, ThreadHandle,
    UnsupportedOp,
};

/// Stand-in for the one-second sleeps of the corpus programs.
pub const TICK: Duration = Duration::from_millis(2);

/// Captured result of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutput {
    pub stdout: String,
    pub exit_code: i32,
}

impl ScenarioOutput {
    /// Text compared against fixture expectations.
    #[must_use]
    pub fn render(&self) -> String {
        render_outcome(&self.stdout, self.exit_code)
    }
}

/// Combine console text and exit code into one comparable block.
#[must_use]
pub fn render_outcome(stdout: &str, exit_code: i32) -> String {
    format!("{stdout}[exit {exit_code}]\n")
}

pub type ScenarioFn = fn(&Runtime) -> Result<ScenarioOutput>;

/// Registered scenarios, in run order.
pub const SCENARIOS: &[(&str, ScenarioFn)] = &[
    ("args_retval_intvalue", args_retval_intvalue),
    ("args_retval_pointer", args_retval_pointer),
    ("mutex_shared_val_auto", mutex_shared_val_auto),
    ("join", join_slow_worker),
    ("cond_wait_incval", cond_wait_incval),
    ("destr_test", destr_test),
    ("join_in_thread_int", join_in_thread_int),
    ("mutex_default_unlock_notowner", mutex_default_unlock_notowner),
    ("mutex_errorcheck_unlock_notowner", mutex_errorcheck_unlock_notowner),
    ("mutex_errorcheck_unlock_notlocked", mutex_errorcheck_unlock_notlocked),
    ("detach_join_conflicts", detach_join_conflicts),
    ("self_join", self_join),
    ("recursive_relock", recursive_relock),
    ("once_init", once_init),
    ("unsupported_gate", unsupported_gate),
];

#[must_use]
pub fn lookup(name: &str) -> Option<ScenarioFn> {
    SCENARIOS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, f)| f)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|&(n, _)| n)
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

/// Shared stdout for all threads of a scenario.
#[derive(Clone, Default)]
struct Console(Arc<Mutex<String>>);

impl Console {
    fn line(&self, text: impl AsRef<str>) {
        let mut buf = self.0.lock();
        buf.push_str(text.as_ref());
        buf.push('\n');
    }

    /// Print `"<call> gives return code: N"` when `result` failed.
    fn check(&self, call: &str, result: Result<()>) {
        if let Err(e) = result {
            self.line(format!("{call} gives return code: {}", e.errno()));
        }
    }

    fn finish(self, exit_code: i32) -> ScenarioOutput {
        ScenarioOutput {
            stdout: self.0.lock().clone(),
            exit_code,
        }
    }
}

/// Token-addressed heap for values handed across threads as `usize` payloads.
/// Token 0 is never issued and plays the role of NULL.
struct Heap<T> {
    cells: Mutex<HashMap<usize, T>>,
    next: AtomicUsize,
}

impl<T> Heap<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cells: Mutex::new(HashMap::new()),
            next: AtomicUsize::new(1),
        })
    }

    fn alloc(&self, value: T) -> usize {
        let token = self.next.fetch_add(1, Ordering::Relaxed);
        self.cells.lock().insert(token, value);
        token
    }

    fn free(&self, token: usize) -> Option<T> {
        self.cells.lock().remove(&token)
    }
}

impl<T: Copy> Heap<T> {
    fn read(&self, token: usize) -> Option<T> {
        self.cells.lock().get(&token).copied()
    }
}

/// Start `body(arg)` on a new thread. An error escaping the body is printed
/// and the thread finishes with value 0.
fn spawn<F>(rt: &Runtime, out: &Console, arg: usize, body: F) -> Result<ThreadHandle>
where
    F: FnOnce(&Runtime, usize) -> Result<usize> + Send + 'static,
{
    let worker_rt = rt.clone();
    let out = out.clone();
    rt.create(
        move |arg| match body(&worker_rt, arg) {
            Ok(value) => value,
            Err(e) => {
                out.line(format!("error: {e} (errno {})", e.errno()));
                0
            }
        },
        arg,
    )
}

// ---------------------------------------------------------------------------
// Corpus programs
// ---------------------------------------------------------------------------

fn args_retval_intvalue(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let add_up_to = |rt: &Runtime, stop: usize| -> Result<usize> { rt.exit((1..=stop).sum()) };

    let th1 = spawn(rt, &out, 150, add_up_to)?;
    let th2 = spawn(rt, &out, 250, add_up_to)?;
    let ret1 = rt.join(th1)?;
    let ret2 = rt.join(th2)?;
    let sum = ret1 + ret2;

    out.line(format!("thread1 returns sum {ret1}"));
    out.line(format!("thread2 returns sum {ret2}"));
    out.line(format!("{sum}"));
    Ok(out.finish(if sum == 42700 { 0 } else { 1 }))
}

#[derive(Clone, Copy)]
struct CalcArgs {
    a: i32,
    b: i32,
}

#[derive(Clone, Copy)]
struct CalcResults {
    sum: i32,
    difference: i32,
    product: i32,
    quotient: i32,
    modulus: i32,
}

fn args_retval_pointer(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let args_heap: Arc<Heap<CalcArgs>> = Heap::new();
    let results_heap: Arc<Heap<CalcResults>> = Heap::new();

    let mut children = Vec::with_capacity(5);
    for i in 1..=5 {
        let args = args_heap.alloc(CalcArgs { a: i, b: i * i });
        let args_heap = Arc::clone(&args_heap);
        let results_heap = Arc::clone(&results_heap);
        let child = spawn(rt, &out, args, move |rt, token| {
            let Some(CalcArgs { a, b }) = args_heap.free(token) else {
                rt.exit(0)
            };
            let results = CalcResults {
                sum: a + b,
                difference: a - b,
                product: a * b,
                quotient: a / b,
                modulus: a % b,
            };
            rt.exit(results_heap.alloc(results))
        })?;
        children.push((i, child));
    }

    for (i, child) in children {
        let token = rt.join(child)?;
        let r = results_heap.free(token).ok_or(ThreadError::Invalid)?;
        out.line(format!(
            "Calculator ({}, {:2}) ==> +:{:3};   -:{:3};   *:{:3};   /:{:3};   %:{:3}",
            i,
            i * i,
            r.sum,
            r.difference,
            r.product,
            r.quotient,
            r.modulus
        ));
    }
    Ok(out.finish(0))
}

fn mutex_shared_val_auto(rt: &Runtime) -> Result<ScenarioOutput> {
    const NUM_THREADS: usize = 100;

    let out = Console::default();
    let mutex = rt.mutex_init(MutexKind::Normal);
    // Relaxed load/store pairs: only the runtime mutex keeps the increment whole.
    let val = Arc::new(AtomicI32::new(0));

    let mut threads = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let val = Arc::clone(&val);
        let console = out.clone();
        threads.push(spawn(rt, &out, 0, move |rt, _| {
            rt.mutex_lock(mutex)?;
            console.line("thread got the mutex");
            let now = val.load(Ordering::Relaxed) + 1;
            val.store(now, Ordering::Relaxed);
            console.line(format!("thread increased the value, value is now: {now}"));
            rt.mutex_unlock(mutex)?;
            rt.exit(0)
        })?);
    }
    for t in threads {
        rt.join(t)?;
    }

    let val = val.load(Ordering::Relaxed);
    out.line(format!("shared var is now: {val}"));
    Ok(out.finish(val))
}

fn join_slow_worker(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let val = Arc::new(AtomicI32::new(0));

    let worker_val = Arc::clone(&val);
    let th1 = spawn(rt, &out, 0, move |rt, _| {
        for i in 1..=5 {
            worker_val.fetch_add(i, Ordering::Relaxed);
            std::thread::sleep(TICK);
        }
        rt.exit(0)
    })?;
    rt.join(th1)?;

    let val = val.load(Ordering::Relaxed);
    out.line(format!("now value is {val}"));
    Ok(out.finish(val))
}

fn cond_wait_incval(rt: &Runtime) -> Result<ScenarioOutput> {
    const COUNT_DONE: i32 = 10;
    const COUNT_HALT1: i32 = 3;
    const COUNT_HALT2: i32 = 6;

    let out = Console::default();
    let count_mutex = rt.mutex_init(MutexKind::Normal);
    let condition_var = rt.cond_init();
    let count = Arc::new(AtomicI32::new(0));

    // Counts 1-3 and 8-10, each step released by a signal.
    let (c1, out1) = (Arc::clone(&count), out.clone());
    let thread1 = spawn(rt, &out, 0, move |rt, _| {
        loop {
            rt.mutex_lock(count_mutex)?;
            rt.cond_wait(condition_var, count_mutex)?;
            let now = c1.load(Ordering::Relaxed) + 1;
            c1.store(now, Ordering::Relaxed);
            out1.line(format!("Cur counter value functionCount1: {now}"));
            rt.mutex_unlock(count_mutex)?;
            if now >= COUNT_DONE {
                return Ok(0);
            }
        }
    })?;

    // Counts 4-7, signals everywhere else.
    let (c2, out2) = (Arc::clone(&count), out.clone());
    let thread2 = spawn(rt, &out, 0, move |rt, _| {
        loop {
            rt.mutex_lock(count_mutex)?;
            let mut now = c2.load(Ordering::Relaxed);
            if !(COUNT_HALT1..=COUNT_HALT2).contains(&now) {
                rt.cond_signal(condition_var)?;
            } else {
                now += 1;
                c2.store(now, Ordering::Relaxed);
                out2.line(format!("Cur counter value functionCount2: {now}"));
            }
            rt.mutex_unlock(count_mutex)?;
            if now >= COUNT_DONE {
                return Ok(0);
            }
            std::thread::yield_now();
        }
    })?;

    rt.join(thread1)?;
    rt.join(thread2)?;
    out.line(format!(
        "Final count is: {}",
        count.load(Ordering::Relaxed)
    ));
    Ok(out.finish(0))
}

fn destr_test(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let heap: Arc<Heap<i32>> = Heap::new();

    let destr: Destructor = {
        let (out, heap) = (out.clone(), Arc::clone(&heap));
        Arc::new(move |token| {
            let param = heap.free(token).unwrap_or_default();
            out.line(format!("destructor invoked with param {param}\n"));
        })
    };
    let key = rt.key_create(Some(destr))?;

    let console = out.clone();
    let t = spawn(rt, &out, 0, move |rt, _| {
        rt.set_specific(key, heap.alloc(15))?;
        let got = rt
            .get_specific(key)?
            .and_then(|token| heap.read(token))
            .unwrap_or_default();
        console.line(format!("thread sets 15 and gets: {got}\n"));
        rt.exit(0)
    })?;
    rt.join(t)?;
    Ok(out.finish(0))
}

fn join_in_thread_int(rt: &Runtime) -> Result<ScenarioOutput> {
    const NUM_THREADS: usize = 5;

    let out = Console::default();
    let mut prev = spawn(rt, &out, 0, |rt, _| {
        std::thread::sleep(TICK);
        rt.exit(0)
    })?;
    for _ in 1..NUM_THREADS {
        let console = out.clone();
        let target = prev;
        prev = spawn(rt, &out, 0, move |rt, _| {
            let retval = rt.join(target)?;
            console.line(format!("thread with retval {retval} finished"));
            std::thread::sleep(TICK);
            rt.exit(retval + 1)
        })?;
    }

    let retval = rt.join(prev)?;
    out.line(format!("now value is {retval}"));
    Ok(out.finish(i32::try_from(retval).unwrap_or(-1)))
}

/// Lock a mutex of `kind` on this thread, unlock it from another.
fn unlock_from_other_thread(rt: &Runtime, kind: i32) -> Result<ScenarioOutput> {
    let out = Console::default();
    let mut attr = MutexAttr::new();
    out.check("pthread_mutexattr_settype()", attr.set_type(kind));
    let mutex = rt.mutex_init_with(&attr);
    out.check("pthread_mutex_lock()", rt.mutex_lock(mutex));

    let console = out.clone();
    let t = spawn(rt, &out, 0, move |rt, _| {
        let result = errno_of(rt.mutex_unlock(mutex));
        console.line(format!("result of unlock: {result}"));
        rt.exit(0)
    })?;
    rt.join(t)?;

    out.check("pthread_mutex_unlock()", rt.mutex_unlock(mutex));
    Ok(out.finish(0))
}

fn mutex_default_unlock_notowner(rt: &Runtime) -> Result<ScenarioOutput> {
    unlock_from_other_thread(rt, PTHREAD_MUTEX_DEFAULT)
}

fn mutex_errorcheck_unlock_notowner(rt: &Runtime) -> Result<ScenarioOutput> {
    unlock_from_other_thread(rt, PTHREAD_MUTEX_ERRORCHECK)
}

fn mutex_errorcheck_unlock_notlocked(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let mut attr = MutexAttr::new();
    out.check("pthread_mutexattr_settype()", attr.set_type(PTHREAD_MUTEX_ERRORCHECK));
    let mutex = rt.mutex_init_with(&attr);
    out.check("pthread_mutex_unlock()", rt.mutex_unlock(mutex));
    Ok(out.finish(0))
}

// ---------------------------------------------------------------------------
// Lifecycle and gate checks
// ---------------------------------------------------------------------------

fn detach_join_conflicts(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();

    let detached = spawn(rt, &out, 0, |_, _| {
        std::thread::sleep(TICK);
        Ok(0)
    })?;
    rt.detach(detached)?;
    out.line(format!(
        "join after detach: {}",
        errno_of(rt.join(detached).map(drop))
    ));

    let joined = spawn(rt, &out, 0, |_, _| Ok(7))?;
    let value = rt.join(joined)?;
    out.line(format!("joined value: {value}"));
    out.line(format!("detach after join: {}", errno_of(rt.detach(joined))));
    out.line(format!(
        "second join: {}",
        errno_of(rt.join(joined).map(drop))
    ));
    Ok(out.finish(0))
}

fn self_join(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let console = out.clone();
    let t = spawn(rt, &out, 0, move |rt, _| {
        let me = rt.self_handle();
        console.line(format!("self join: {}", errno_of(rt.join(me).map(drop))));
        Ok(usize::from(rt.equal(me, rt.self_handle())))
    })?;
    let same = rt.join(t)?;
    out.line(format!("self equal: {same}"));
    Ok(out.finish(0))
}

fn recursive_relock(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();

    let recursive = rt.mutex_init(MutexKind::Recursive);
    for _ in 0..3 {
        rt.mutex_lock(recursive)?;
    }
    out.line(format!(
        "recursive trylock while held: {}",
        errno_of(rt.mutex_trylock(recursive))
    ));
    for _ in 0..4 {
        rt.mutex_unlock(recursive)?;
    }
    out.line(format!(
        "extra unlock: {}",
        errno_of(rt.mutex_unlock(recursive))
    ));

    let errorcheck = rt.mutex_init(MutexKind::ErrorCheck);
    rt.mutex_lock(errorcheck)?;
    out.line(format!(
        "errorcheck relock: {}",
        errno_of(rt.mutex_lock(errorcheck))
    ));
    out.line(format!(
        "destroy while locked: {}",
        errno_of(rt.mutex_destroy(errorcheck))
    ));
    rt.mutex_unlock(errorcheck)?;
    rt.mutex_destroy(errorcheck)?;
    Ok(out.finish(0))
}

fn once_init(rt: &Runtime) -> Result<ScenarioOutput> {
    const CALLERS: usize = 4;

    let out = Console::default();
    let control = Arc::new(OnceControl::new());
    let runs = Arc::new(AtomicUsize::new(0));

    let mut threads = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let (control, runs) = (Arc::clone(&control), Arc::clone(&runs));
        threads.push(spawn(rt, &out, 0, move |rt, _| {
            rt.once(&control, || {
                runs.fetch_add(1, Ordering::Relaxed);
            });
            Ok(0)
        })?);
    }
    for t in threads {
        rt.join(t)?;
    }
    out.line(format!(
        "init ran {} time(s)",
        runs.load(Ordering::Relaxed)
    ));
    Ok(out.finish(0))
}

fn unsupported_gate(rt: &Runtime) -> Result<ScenarioOutput> {
    let out = Console::default();
    let before = rt.metrics();
    let rejected = UnsupportedOp::ALL
        .iter()
        .filter(|&&op| errno_of(rt.unsupported(op)) == ENOTSUP)
        .count();
    rt.testcancel();
    out.line(format!(
        "{rejected} of {} operations rejected with ENOTSUP",
        UnsupportedOp::ALL.len()
    ));
    out.line(format!("state unchanged: {}", before == rt.metrics()));
    Ok(out.finish(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut all: Vec<_> = names().collect();
        let before = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), before);
    }

    #[test]
    fn lookup_finds_registered() {
        assert!(lookup("join").is_some());
        assert!(lookup("no_such_program").is_none());
    }

    #[test]
    fn heap_tokens_start_above_null() {
        let heap: Arc<Heap<i32>> = Heap::new();
        let token = heap.alloc(15);
        assert_ne!(token, 0);
        assert_eq!(heap.read(token), Some(15));
        assert_eq!(heap.free(token), Some(15));
        assert_eq!(heap.free(token), None);
    }

    #[test]
    fn intvalue_program_sums() {
        let out = args_retval_intvalue(&Runtime::new()).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.ends_with("42700\n"));
    }

    #[test]
    fn errorcheck_notowner_rejects() {
        let out = mutex_errorcheck_unlock_notowner(&Runtime::new()).unwrap();
        assert_eq!(out.stdout, "result of unlock: 1\n");
    }

    #[test]
    fn render_appends_exit_code() {
        let out = ScenarioOutput {
            stdout: "now value is 15\n".to_string(),
            exit_code: 15,
        };
        assert_eq!(out.render(), "now value is 15\n[exit 15]\n");
    }
}
