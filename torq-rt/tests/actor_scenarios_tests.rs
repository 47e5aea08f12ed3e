//! End-to-end actor scenarios: configure, ask/respond, recursion with
//! preemption, act-based child computations with trigger synchronization,
//! spawn with incomplete captures, and cooperative stop.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use torq_rt::machine::{BinOp, Instr, Operand, Pattern, ProcDef};
use torq_rt::system::{ActorBuilder, ActorSystem, RequestClient, SystemConfig};
use torq_rt::util::ActorAddress;
use torq_rt::value::{ActorCfg, Closure, Lit, NativeActorHandler, Obj, Value};

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn closure0(def: ProcDef) -> Closure {
    Closure {
        def: Arc::new(def),
        captured: Vec::new(),
    }
}

fn kernel_cfg(ctor: ProcDef, args: Vec<Value>) -> ActorCfg {
    ActorCfg::kernel(closure0(ctor), args)
}

// ============================================================================
// HelloWorld: handle ask 'hello' -> 'Hello, World!'
// ============================================================================

fn hello_world_cfg() -> ActorCfg {
    let handler = ProcDef::new(
        &["$m"],
        &[],
        Instr::case(
            Operand::ident("$m"),
            Pattern::Lit(Lit::str("hello")),
            Instr::apply(
                Operand::ident("respond"),
                vec![Operand::str("Hello, World!")],
            ),
            Some(Instr::case(
                Operand::ident("$m"),
                Pattern::Lit(Lit::str("goodbye")),
                Instr::apply(
                    Operand::ident("respond"),
                    vec![Operand::str("Goodbye, World!")],
                ),
                None,
            )),
        ),
    );
    let ctor = ProcDef::new(
        &["$h"],
        &[],
        Instr::create_proc(handler, Operand::ident("$h")),
    );
    kernel_cfg(ctor, Vec::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hello_world_asks_and_responds() {
    init_tracing();
    let system = ActorSystem::builder().add_default_modules().build();
    let actor = ActorBuilder::new()
        .set_system(system)
        .set_address(ActorAddress::named("hello-world"))
        .spawn(hello_world_cfg())
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&actor, Value::str("hello"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::str("Hello, World!"));

    let response = client
        .send_and_await_response(&actor, Value::str("goodbye"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::str("Goodbye, World!"));
}

// ============================================================================
// Factorial: recursion, int/dec coercion, preemption under a small budget
// ============================================================================

fn factorial_cfg() -> ActorCfg {
    let fact = ProcDef::new(
        &["n", "out"],
        &["fact"],
        Instr::local(
            &["is_base"],
            Instr::seq(vec![
                Instr::bin(
                    BinOp::Lt,
                    Operand::ident("n"),
                    Operand::dec(Decimal::from(2)),
                    Operand::ident("is_base"),
                ),
                Instr::if_else(
                    Operand::ident("is_base"),
                    Instr::bind(Operand::ident("out"), Operand::int(1)),
                    Some(Instr::local(
                        &["n1", "r1"],
                        Instr::seq(vec![
                            Instr::bin(
                                BinOp::Sub,
                                Operand::ident("n"),
                                Operand::int(1),
                                Operand::ident("n1"),
                            ),
                            Instr::apply(
                                Operand::ident("fact"),
                                vec![Operand::ident("n1"), Operand::ident("r1")],
                            ),
                            Instr::bin(
                                BinOp::Mul,
                                Operand::ident("n"),
                                Operand::ident("r1"),
                                Operand::ident("out"),
                            ),
                        ]),
                    )),
                ),
            ]),
        ),
    );
    let handler = ProcDef::new(
        &["$m"],
        &["fact"],
        Instr::local(
            &["r"],
            Instr::seq(vec![
                Instr::apply(
                    Operand::ident("fact"),
                    vec![Operand::ident("$m"), Operand::ident("r")],
                ),
                Instr::apply(Operand::ident("respond"), vec![Operand::ident("r")]),
            ]),
        ),
    );
    let ctor = ProcDef::new(
        &["$h"],
        &[],
        Instr::local(
            &["fact"],
            Instr::seq(vec![
                Instr::create_proc(fact, Operand::ident("fact")),
                Instr::create_proc(handler, Operand::ident("$h")),
            ]),
        ),
    );
    kernel_cfg(ctor, Vec::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn factorial_of_ten_zero_and_negative_decimal() {
    init_tracing();
    // A tiny budget forces preemption and Resume self-messages mid-request.
    let system = ActorSystem::builder()
        .with_config(SystemConfig::default().with_instruction_budget(5))
        .add_default_modules()
        .build();
    let actor = ActorBuilder::new()
        .set_system(system)
        .set_address(ActorAddress::named("factorial"))
        .spawn(factorial_cfg())
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&actor, Value::Int(10), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(3_628_800));

    let response = client
        .send_and_await_response(&actor, Value::Int(0), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(1));

    // The integer decimal variant: -1m hits the n < 2m base case.
    let response = client
        .send_and_await_response(&actor, Value::Dec(Decimal::from(-1)), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(1));
}

// ============================================================================
// Act + SyncVar: a child computation captures an unbound parent variable,
// suspends on it, and resumes when the parent's binding triggers a SyncVar.
// ============================================================================

fn act_capture_cfg() -> ActorCfg {
    // act body: t = X + 1; respond(t)
    let act_body = ProcDef::new(
        &[],
        &["X"],
        Instr::local(
            &["t"],
            Instr::seq(vec![
                Instr::bin(
                    BinOp::Add,
                    Operand::ident("X"),
                    Operand::int(1),
                    Operand::ident("t"),
                ),
                Instr::apply(Operand::ident("respond"), vec![Operand::ident("t")]),
            ]),
        ),
    );
    // handle ask 'go': run the act, bind X afterwards, respond the result.
    let handler = ProcDef::new(
        &["$m"],
        &["X"],
        Instr::case(
            Operand::ident("$m"),
            Pattern::Lit(Lit::str("go")),
            Instr::local(
                &["r", "body"],
                Instr::seq(vec![
                    Instr::create_proc(act_body, Operand::ident("body")),
                    Instr::apply(
                        Operand::ident("act"),
                        vec![Operand::ident("body"), Operand::ident("r")],
                    ),
                    Instr::bind(Operand::ident("X"), Operand::int(42)),
                    Instr::apply(Operand::ident("respond"), vec![Operand::ident("r")]),
                ]),
            ),
            None,
        ),
    );
    let ctor = ProcDef::new(
        &["$h"],
        &[],
        Instr::local(
            &["X"],
            Instr::create_proc(handler, Operand::ident("$h")),
        ),
    );
    kernel_cfg(ctor, Vec::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn act_child_resumes_on_sync_var() {
    init_tracing();
    let system = ActorSystem::builder().add_default_modules().build();
    let actor = ActorBuilder::new()
        .set_system(system)
        .set_address(ActorAddress::named("act-parent"))
        .spawn(act_capture_cfg())
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&actor, Value::str("go"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(43));
}

// ============================================================================
// Notify: one-way messages are FIFO with requests from the same sender, and
// a notify may bind dataflow state a later ask responds with.
// ============================================================================

fn collector_cfg() -> ActorCfg {
    // handle 'set' (notify): bind Y; handle ask 'get': respond Y.
    let handler = ProcDef::new(
        &["$m"],
        &["Y"],
        Instr::case(
            Operand::ident("$m"),
            Pattern::Lit(Lit::str("set")),
            Instr::bind(Operand::ident("Y"), Operand::int(99)),
            Some(Instr::case(
                Operand::ident("$m"),
                Pattern::Lit(Lit::str("get")),
                Instr::apply(Operand::ident("respond"), vec![Operand::ident("Y")]),
                None,
            )),
        ),
    );
    let ctor = ProcDef::new(
        &["$h"],
        &[],
        Instr::local(&["Y"], Instr::create_proc(handler, Operand::ident("$h"))),
    );
    kernel_cfg(ctor, Vec::new())
}

fn notifier_cfg(collector: Value) -> ActorCfg {
    // handle ask 'go': notify c 'set', ask c 'get', respond the result.
    let handler = ProcDef::new(
        &["$m"],
        &["c"],
        Instr::case(
            Operand::ident("$m"),
            Pattern::Lit(Lit::str("go")),
            Instr::local(
                &["r"],
                Instr::seq(vec![
                    Instr::apply(Operand::ident("c"), vec![Operand::str("set")]),
                    Instr::apply(
                        Operand::ident("c"),
                        vec![Operand::str("get"), Operand::ident("r")],
                    ),
                    Instr::apply(Operand::ident("respond"), vec![Operand::ident("r")]),
                ]),
            ),
            None,
        ),
    );
    let ctor = ProcDef::new(
        &["c", "$h"],
        &[],
        Instr::create_proc(handler, Operand::ident("$h")),
    );
    kernel_cfg(ctor, vec![collector])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notify_binds_state_a_later_ask_observes() {
    init_tracing();
    let system = ActorSystem::builder().add_default_modules().build();
    let collector = ActorBuilder::new()
        .set_system(system.clone())
        .set_address(ActorAddress::named("collector"))
        .spawn(collector_cfg())
        .unwrap();
    let notifier = ActorBuilder::new()
        .set_system(system)
        .set_address(ActorAddress::named("notifier"))
        .spawn(notifier_cfg(Value::Obj(Obj::Actor(collector))))
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&notifier, Value::str("go"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(99));
}

// ============================================================================
// Spawn: captures must be Complete; an unbound capture suspends the spawn
// and re-running it creates exactly one child.
// ============================================================================

struct SlowSeven;

impl NativeActorHandler for SlowSeven {
    fn on_request(&self, _message: &Value) -> Result<Vec<Value>, Value> {
        // Give the parent time to reach its spawn and suspend on the
        // still-unbound capture.
        std::thread::sleep(Duration::from_millis(50));
        Ok(vec![Value::Int(7)])
    }

    fn name(&self) -> &str {
        "slow-seven"
    }
}

fn spawning_parent_cfg(helper: Value) -> ActorCfg {
    // Child: respond the captured t to any ask.
    let child_handler = ProcDef::new(
        &["$m"],
        &["t"],
        Instr::apply(Operand::ident("respond"), vec![Operand::ident("t")]),
    );
    let child_ctor = ProcDef::new(
        &["$h"],
        &["t"],
        Instr::create_proc(child_handler, Operand::ident("$h")),
    );
    // Parent handler: forward any ask to the child.
    let handler = ProcDef::new(
        &["$m"],
        &["child"],
        Instr::local(
            &["u"],
            Instr::seq(vec![
                Instr::apply(
                    Operand::ident("child"),
                    vec![Operand::str("ping"), Operand::ident("u")],
                ),
                Instr::apply(Operand::ident("respond"), vec![Operand::ident("u")]),
            ]),
        ),
    );
    // Parent ctor: ask the helper for t, then spawn a child capturing t.
    // The spawn suspends until the helper's response binds t.
    let ctor = ProcDef::new(
        &["helper", "$h"],
        &[],
        Instr::local(
            &["t", "childCtor", "childCfg", "child", "sels", "ActorCfg"],
            Instr::seq(vec![
                Instr::apply(
                    Operand::ident("helper"),
                    vec![Operand::str("get"), Operand::ident("t")],
                ),
                Instr::create_proc(child_ctor, Operand::ident("childCtor")),
                Instr::create_tuple(
                    Operand::Lit(Lit::Nothing),
                    vec![Operand::str("ActorCfg")],
                    Operand::ident("sels"),
                ),
                Instr::apply(
                    Operand::ident("import"),
                    vec![Operand::str("system"), Operand::ident("sels")],
                ),
                Instr::select_apply(
                    Operand::ident("ActorCfg"),
                    Operand::str("new"),
                    vec![Operand::ident("childCtor"), Operand::ident("childCfg")],
                ),
                Instr::apply(
                    Operand::ident("spawn"),
                    vec![Operand::ident("childCfg"), Operand::ident("child")],
                ),
                Instr::create_proc(handler, Operand::ident("$h")),
            ]),
        ),
    );
    kernel_cfg(ctor, vec![helper])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_waits_for_captures_and_spawns_exactly_once() {
    init_tracing();
    let system = ActorSystem::builder().add_default_modules().build();
    let helper = ActorBuilder::new()
        .set_system(system.clone())
        .set_address(ActorAddress::named("helper"))
        .spawn(ActorCfg::native(Arc::new(SlowSeven)))
        .unwrap();

    let parent = ActorBuilder::new()
        .set_system(system.clone())
        .set_address(ActorAddress::named("spawner"))
        .spawn(spawning_parent_cfg(Value::Obj(Obj::Actor(helper))))
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&parent, Value::str("go"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::Int(7));

    // helper + parent + exactly one child: the suspended spawn re-ran
    // without creating a second one.
    assert_eq!(system.actor_count(), 3);
    assert!(system.actor_at("spawner/0").is_some());
    assert!(system.actor_at("spawner/1").is_none());
}

// ============================================================================
// Stop: cooperative cancellation at priority 0
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_terminates_and_deregisters() {
    init_tracing();
    let system = ActorSystem::builder().add_default_modules().build();
    let actor = ActorBuilder::new()
        .set_system(system.clone())
        .set_address(ActorAddress::named("stoppable"))
        .spawn(hello_world_cfg())
        .unwrap();

    let client = RequestClient::new();
    let response = client
        .send_and_await_response(&actor, Value::str("hello"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(response, Value::str("Hello, World!"));
    assert_eq!(system.actor_count(), 1);

    system.stop_actor(&actor);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(system.actor_count(), 0);

    // A stopped actor never answers.
    let late = client
        .send_and_await_response(&actor, Value::str("hello"), Duration::from_millis(200))
        .await;
    assert!(late.is_err());
}
