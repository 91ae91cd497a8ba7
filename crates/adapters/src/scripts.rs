// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell script templates deployed to remote hosts. These are bash, not
//! Rust: the templates must agree byte-for-byte with `rj_core::queue_line`
//! on the queue-file wire format, since one side writes the file and the
//! other (the deployed script) reads it. The queue dir / paths come from
//! `rj_core::paths` so neither side hardcodes a layout the other
//! disagrees with.

use rj_core::paths;

/// Generates the queue runner script deployed once per host to
/// `~/.cache/rj/scripts/queue-runner.sh`; the queue name arrives as `$1`
/// when the runner session is spawned, so one deployed script serves every
/// queue on the host.
///
/// The loop: atomically dequeue the head line, journal it, requeue it at
/// the tail when its `after_spec` dependency is unsatisfied, then build the
/// per-job execution envelope (START/END banners, pid file, status file,
/// metadata file, notification hook) and launch it in a detached tmux
/// session named `rj-{job_id}`, waiting for the session to finish before
/// consuming the next line. Directory assignments are left unquoted so a
/// leading `~` expands.
pub fn queue_runner_script() -> String {
    format!(
        r#"#!/usr/bin/env bash
# Generated queue runner. Do not edit by hand.
set -u

QUEUE_NAME="${{1:?usage: queue-runner.sh <queue-name>}}"
QUEUE_DIR={queue_dir}
LOG_DIR={log_dir}
NOTIFY={notify_helper}

QUEUE="$QUEUE_DIR/$QUEUE_NAME.queue"
CURRENT="$QUEUE_DIR/$QUEUE_NAME.current"
RUNNER_PID="$QUEUE_DIR/$QUEUE_NAME.runner.pid"
STOP="$QUEUE_DIR/$QUEUE_NAME.stop"
JOURNAL="$QUEUE.journal"

mkdir -p "$QUEUE_DIR" "$LOG_DIR"
echo $$ > "$RUNNER_PID"
trap 'rm -f "$RUNNER_PID"' EXIT

# A journal left over from a crashed run holds a dequeued-but-unfinished
# line; put it back at the head of the queue before consuming anything.
if [ -s "$JOURNAL" ]; then
    cat "$JOURNAL" "$QUEUE" 2>/dev/null > "$QUEUE.tmp" && mv "$QUEUE.tmp" "$QUEUE"
    rm -f "$JOURNAL"
fi

while true; do
    if [ -e "$STOP" ]; then
        rm -f "$STOP"
        break
    fi

    if [ ! -s "$QUEUE" ]; then
        sleep 1
        continue
    fi

    line=$(head -n 1 "$QUEUE")
    tail -n +2 "$QUEUE" > "$QUEUE.tmp" && mv "$QUEUE.tmp" "$QUEUE"
    printf '%s\n' "$line" > "$JOURNAL"

    IFS=$'\t' read -r job_id working_dir command description env_b64 after_spec <<< "$line"
    if ! [[ "$job_id" =~ ^[0-9]+$ ]]; then
        echo "queue-runner: malformed line, skipping: $line" >&2
        rm -f "$JOURNAL"
        continue
    fi

    if [ -n "$after_spec" ]; then
        dep_id="${{after_spec%%:*}}"
        ready=0
        for f in "$LOG_DIR/$dep_id"-*.status; do
            [ -e "$f" ] || continue
            if [[ "$after_spec" == *:any ]]; then
                ready=1
            elif [ "$(tr -d '[:space:]' < "$f")" = "0" ]; then
                ready=1
            fi
        done
        if [ "$ready" -ne 1 ]; then
            printf '%s\n' "$line" >> "$QUEUE"
            rm -f "$JOURNAL"
            sleep 1
            continue
        fi
    fi

    echo "$job_id" > "$CURRENT"

    stamp=$(date +%Y%m%d-%H%M%S)
    stem="$LOG_DIR/$job_id-$stamp"
    session="rj-$job_id"
    cwd="${{working_dir/#\~/$HOME}}"
    start_epoch=$(date +%s)
    label="$description"
    [ -n "$label" ] || label="job-$job_id"

    {{
        printf 'job_id=%s\n' "$job_id"
        printf 'working_dir=%s\n' "$working_dir"
        printf 'command=%s\n' "$command"
        printf 'start_time=%s\n' "$start_epoch"
        printf 'host=%s\n' "$(hostname)"
        if [ -n "$description" ]; then
            printf 'description=%s\n' "$description"
        fi
        printf 'display_dir=%s\n' "$working_dir"
        printf 'display_cmd=%s\n' "$command"
    }} > "$stem.meta"

    {{
        printf '#!/usr/bin/env bash\n'
        printf 'log=%q\nstatus_file=%q\npid_file=%q\n' "$stem.log" "$stem.status" "$stem.pid"
        printf 'job_id=%q\ncwd=%q\ncmd=%q\n' "$job_id" "$cwd" "$command"
        printf 'notify=%q\nlabel=%q\nhost_name=%q\nmeta=%q\n' "$NOTIFY" "$label" "$(hostname)" "$stem.meta"
        printf '%s' "$env_b64" | base64 -d | while IFS='=' read -r key value; do
            [ -n "$key" ] && printf 'export %s=%q\n' "$key" "$value"
        done
        cat <<'ENVELOPE'
printf '=== START job %s at %s ===\ncwd: %s\ncmd: %s\n' "$job_id" "$(date -u +%Y-%m-%dT%H:%M:%SZ)" "$cwd" "$cmd" >> "$log"
cd "$cwd" || {{ echo 127 > "$status_file"; exit 127; }}
bash -c "$cmd" >> "$log" 2>&1 &
child=$!
echo "$child" > "$pid_file"
wait "$child"
code=$?
printf '=== END job %s exit %s ===\n' "$job_id" "$code" >> "$log"
echo "$code" > "$status_file"
if [ -n "$notify" ] && [ -x "$notify" ]; then
    "$notify" "$label" "$code" "$host_name" "$meta" || true
fi
ENVELOPE
    }} > "$stem.sh"

    tmux new-session -d -s "$session" "bash '$stem.sh'"
    while tmux has-session -t "$session" 2>/dev/null; do
        sleep 1
    done

    code=$(cat "$stem.status" 2>/dev/null || echo '?')
    duration=$(( $(date +%s) - start_epoch ))
    echo "queue-runner: job $job_id finished with exit $code after ${{duration}}s"

    rm -f "$CURRENT" "$JOURNAL"
done
"#,
        queue_dir = paths::queue_dir(),
        log_dir = paths::log_dir(),
        notify_helper = paths::notify_helper_path(),
    )
}

/// Generates the notification helper invoked by the envelope's final step,
/// forwarding `(job-label, exit-code, host, metadata-file)` to the webhook
/// URL baked in at deploy time.
pub fn notify_helper_script(webhook_url: &str) -> String {
    format!(
        r#"#!/usr/bin/env bash
# Generated notification helper. Do not edit by hand.
set -u

job_label="$1"
exit_code="$2"
host="$3"
metadata_file="$4"

payload=$(printf '{{"job":"%s","exit_code":%s,"host":"%s","metadata_path":"%s"}}' \
    "$job_label" "$exit_code" "$host" "$metadata_file")

curl -sS -X POST -H 'Content-Type: application/json' -d "$payload" "{webhook_url}" >/dev/null 2>&1 || true
"#,
        webhook_url = webhook_url,
    )
}
