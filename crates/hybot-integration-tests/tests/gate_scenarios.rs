//! End-to-end gate scenarios: classification, policy, confirmation and
//! execution wired together the way the CLI wires them.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    GateHarness, ScriptedResponder, SilentResponder, approve_once, deny_once, interactive,
};
use hybot_guard::{
    ApprovalChannel, ApprovalDecision, ApprovalMode, DenialReason, ExecutionOutcome, GateError,
    GateEvent, GateState, Operation, Outcome, ResolutionKind, ResponderReply,
};

#[tokio::test]
async fn recursive_delete_runs_once_after_approval() {
    let responder = ScriptedResponder::new(vec![approve_once()]);
    let (h, spy) = GateHarness::spy(ApprovalMode::Dangerous, interactive(responder.clone()));

    let outcome = h
        .executor
        .execute(&Operation::shell("rm -rf /tmp/testdir"))
        .await
        .unwrap();

    assert!(outcome.is_executed());
    assert_eq!(spy.calls(), vec!["shell:rm -rf /tmp/testdir"]);

    let prompts = responder.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0].matched_rule.as_deref(),
        Some("recursive-force-delete")
    );
    assert!(h.ctx.memory().is_empty());
    assert_eq!(h.ctx.state(), GateState::Idle);
}

#[tokio::test]
async fn always_mode_denial_never_invokes_primitive() {
    let responder = ScriptedResponder::new(vec![deny_once()]);
    let (h, spy) = GateHarness::spy(ApprovalMode::Always, interactive(responder.clone()));

    let outcome = h
        .executor
        .execute(&Operation::shell("ls -la"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ExecutionOutcome::Denied {
            reason: DenialReason::User
        }
    );
    assert!(spy.calls().is_empty());
    let prompts = responder.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].matched_rule, None);
    assert_eq!(prompts[0].rule_class, "shell");
    assert!(outcome.to_string().contains("Do not retry"));
}

#[tokio::test]
async fn non_interactive_always_mode_fails_closed() {
    let (h, spy) = GateHarness::spy(ApprovalMode::Always, ApprovalChannel::non_interactive());

    let outcome = h
        .executor
        .execute(&Operation::shell("ls -la"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ExecutionOutcome::Denied {
            reason: DenialReason::NonInteractive
        }
    );
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn non_interactive_dangerous_mode_proceeds() {
    let (h, spy) = GateHarness::spy(ApprovalMode::Dangerous, ApprovalChannel::non_interactive());

    let outcome = h
        .executor
        .execute(&Operation::shell("sudo apt update"))
        .await
        .unwrap();

    assert!(outcome.is_executed());
    assert_eq!(spy.calls(), vec!["shell:sudo apt update"]);
}

#[tokio::test]
async fn never_mode_skips_confirmation() {
    let responder = ScriptedResponder::new(vec![]);
    let (h, spy) = GateHarness::spy(ApprovalMode::Never, interactive(responder.clone()));

    let outcome = h
        .executor
        .execute(&Operation::shell("git push --force origin main"))
        .await
        .unwrap();

    assert!(outcome.is_executed());
    assert_eq!(spy.calls().len(), 1);
    assert!(responder.prompts().is_empty());
}

#[tokio::test]
async fn remembered_approval_covers_the_same_rule_class_only() {
    let responder = ScriptedResponder::new(vec![
        ResponderReply::Decision(ApprovalDecision::remember(
            Outcome::Approve,
            "git-force-push",
        )),
        deny_once(),
    ]);
    let (h, spy) = GateHarness::spy(ApprovalMode::Dangerous, interactive(responder.clone()));
    let mut events = h.ctx.events().subscribe();

    let first = h
        .executor
        .execute(&Operation::shell("git push --force"))
        .await
        .unwrap();
    let second = h
        .executor
        .execute(&Operation::shell("git push -f origin feature"))
        .await
        .unwrap();
    let other = h
        .executor
        .execute(&Operation::shell("sudo ls"))
        .await
        .unwrap();

    assert!(first.is_executed());
    assert!(second.is_executed());
    assert!(other.is_denied());
    assert_eq!(responder.prompts().len(), 2);
    assert_eq!(spy.calls().len(), 2);
    assert_eq!(
        h.ctx.memory().recall("git-force-push"),
        Some(Outcome::Approve)
    );

    // requested + resolved for the first call, then the remembered resolution
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let GateEvent::ApprovalResolved {
            resolution,
            request_id,
            ..
        } = event.as_ref()
        {
            kinds.push((*resolution, request_id.is_some()));
        }
    }
    assert_eq!(
        kinds,
        vec![
            (ResolutionKind::Responder, true),
            (ResolutionKind::Remembered, false),
            (ResolutionKind::Responder, true),
        ]
    );
}

#[tokio::test]
async fn remembered_denial_is_reported_as_remembered() {
    let responder = ScriptedResponder::new(vec![ResponderReply::Decision(
        ApprovalDecision::remember(Outcome::Deny, "privilege-escalation"),
    )]);
    let (h, spy) = GateHarness::spy(ApprovalMode::Dangerous, interactive(responder.clone()));

    let first = h
        .executor
        .execute(&Operation::shell("sudo reboot"))
        .await
        .unwrap();
    let second = h
        .executor
        .execute(&Operation::shell("doas id"))
        .await
        .unwrap();

    assert_eq!(
        first,
        ExecutionOutcome::Denied {
            reason: DenialReason::User
        }
    );
    assert_eq!(
        second,
        ExecutionOutcome::Denied {
            reason: DenialReason::Remembered
        }
    );
    assert_eq!(responder.prompts().len(), 1);
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn interrupt_cancels_pending_and_aborts_the_turn() {
    let (h, spy) = GateHarness::spy(
        ApprovalMode::Dangerous,
        interactive(Arc::new(SilentResponder)),
    );

    let op = Operation::shell("rm -rf build");
    let (outcome, ()) = tokio::join!(h.executor.execute(&op), async {
        while h.ctx.state() != GateState::AwaitingApproval {
            tokio::task::yield_now().await;
        }
        h.ctx.interrupt();
    });

    assert_eq!(
        outcome.unwrap(),
        ExecutionOutcome::Denied {
            reason: DenialReason::Cancelled
        }
    );
    assert_eq!(h.ctx.state(), GateState::Idle);

    // the rest of the turn is refused without classification or prompting
    let follow_up = h
        .executor
        .execute(&Operation::shell("echo hi"))
        .await
        .unwrap();
    assert_eq!(
        follow_up,
        ExecutionOutcome::Denied {
            reason: DenialReason::Cancelled
        }
    );
    assert!(spy.calls().is_empty());

    h.ctx.begin_turn();
    let next_turn = h
        .executor
        .execute(&Operation::shell("echo hi"))
        .await
        .unwrap();
    assert!(next_turn.is_executed());
    assert_eq!(spy.calls(), vec!["shell:echo hi"]);
}

#[tokio::test]
async fn second_pending_request_is_an_invariant_violation() {
    let (h, _spy) = GateHarness::spy(
        ApprovalMode::Always,
        interactive(Arc::new(SilentResponder)),
    );

    let first_op = Operation::shell("echo one");
    let second_op = Operation::shell("echo two");
    let (first, second) = tokio::join!(h.executor.execute(&first_op), async {
        while h.ctx.state() != GateState::AwaitingApproval {
            tokio::task::yield_now().await;
        }
        let result = h.executor.execute(&second_op).await;
        h.ctx.interrupt();
        result
    });

    assert!(matches!(second, Err(GateError::InvariantViolation(_))));
    assert!(first.unwrap().is_denied());
}

#[tokio::test]
async fn unanswered_confirmation_times_out_without_aborting() {
    let channel = interactive(Arc::new(SilentResponder)).with_timeout(Duration::from_millis(20));
    let (h, spy) = GateHarness::spy(ApprovalMode::Dangerous, channel);

    let outcome = h
        .executor
        .execute(&Operation::shell("sudo true"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ExecutionOutcome::Denied {
            reason: DenialReason::Timeout
        }
    );
    assert!(!h.ctx.is_turn_aborted());

    let safe = h
        .executor
        .execute(&Operation::shell("ls"))
        .await
        .unwrap();
    assert!(safe.is_executed());
    assert_eq!(spy.calls(), vec!["shell:ls"]);
}

#[tokio::test]
async fn file_operations_against_the_real_filesystem() {
    let outside = tempfile::tempdir().unwrap();
    let outside_file = outside.path().join("escape.txt");
    let responder = ScriptedResponder::new(vec![deny_once(), deny_once()]);
    let h = GateHarness::system(ApprovalMode::Dangerous, interactive(responder.clone()));

    // inside the workspace: no prompt
    let written = h
        .executor
        .execute(&Operation::write("notes/todo.txt", "alpha beta"))
        .await
        .unwrap();
    assert!(written.is_executed());
    assert_eq!(
        std::fs::read_to_string(h.path("notes/todo.txt")).unwrap(),
        "alpha beta"
    );

    let edited = h
        .executor
        .execute(&Operation::edit("notes/todo.txt", "beta", "gamma", false))
        .await
        .unwrap();
    assert!(edited.is_executed());
    assert_eq!(
        std::fs::read_to_string(h.path("notes/todo.txt")).unwrap(),
        "alpha gamma"
    );

    // outside the workspace: prompted and denied, nothing written
    let escaped = h
        .executor
        .execute(&Operation::write(&outside_file, "nope"))
        .await
        .unwrap();
    assert!(escaped.is_denied());
    assert!(!outside_file.exists());

    // protected metadata: prompted and denied, still there
    std::fs::create_dir_all(h.path(".git/objects")).unwrap();
    let removed = h
        .executor
        .execute(&Operation::delete(".git"))
        .await
        .unwrap();
    assert!(removed.is_denied());
    assert!(h.path(".git/objects").exists());

    let rules: Vec<_> = responder
        .prompts()
        .into_iter()
        .filter_map(|p| p.matched_rule)
        .collect();
    assert_eq!(rules, vec!["outside-workspace", "protected-path-delete"]);

    // ordinary delete inside the workspace
    let deleted = h
        .executor
        .execute(&Operation::delete("notes"))
        .await
        .unwrap();
    assert!(deleted.is_executed());
    assert!(!h.path("notes").exists());
}

#[tokio::test]
async fn shell_commands_run_in_the_workspace_root() {
    let h = GateHarness::system(ApprovalMode::Never, ApprovalChannel::non_interactive());
    std::fs::write(h.path("marker.txt"), "here").unwrap();

    let outcome = h
        .executor
        .execute(&Operation::shell("cat marker.txt && exit 4"))
        .await
        .unwrap();

    match outcome {
        ExecutionOutcome::Executed {
            stdout, exit_code, ..
        } => {
            assert_eq!(stdout.trim(), "here");
            assert_eq!(exit_code, 4);
        },
        other => panic!("expected executed, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_edit_is_reported_not_fatal() {
    let h = GateHarness::system(ApprovalMode::Never, ApprovalChannel::non_interactive());

    let missing = h
        .executor
        .execute(&Operation::edit("absent.txt", "a", "b", false))
        .await
        .unwrap();
    assert!(matches!(missing, ExecutionOutcome::Failed { .. }));

    std::fs::write(h.path("dup.txt"), "x x").unwrap();
    let ambiguous = h
        .executor
        .execute(&Operation::edit("dup.txt", "x", "y", false))
        .await
        .unwrap();
    assert!(matches!(
        ambiguous,
        ExecutionOutcome::Executed { exit_code: 1, .. }
    ));
    assert_eq!(std::fs::read_to_string(h.path("dup.txt")).unwrap(), "x x");
}

#[tokio::test]
async fn outcomes_serialize_for_the_agent() {
    let denied = ExecutionOutcome::Denied {
        reason: DenialReason::Timeout,
    };
    let json = serde_json::to_value(&denied).unwrap();
    assert_eq!(json["status"], "denied");
    assert_eq!(json["reason"], "timeout");
}
