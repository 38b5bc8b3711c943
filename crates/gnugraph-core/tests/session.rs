//! Session behaviour against a recording channel.
//!
//! These tests live outside the crate so they can use `gnugraph-test-utils`,
//! which itself depends on `gnugraph-core`.

use gnugraph_config::GraphConfig;
use gnugraph_core::{
    Formatter, OutputMode, PlotError, PlotMode, Point3, Value,
};
use gnugraph_test_utils::{
    TestConfigBuilder, TestOutputDir, capture_diagnostics, echoing_session, recording_session,
};
use pretty_assertions::assert_eq;

fn helix(n: usize) -> Vec<Point3> {
    (0..n)
        .map(|i| {
            let t = i as f64 / 10.0;
            [t.cos(), t.sin(), t]
        })
        .collect()
}

// ── End-to-end 2D ───────────────────────────────────────────────────

#[test_log::test]
fn test_squares_plot_payload_and_echoed_reply() {
    let (mut session, channel) = echoing_session(&GraphConfig::default());

    session
        .add_series(&[1.0, 2.0, 3.0], &[1.0, 4.0, 9.0], "sq")
        .unwrap();
    let reply = session.plot().unwrap();

    let expected = "plot '-' using 1:2 title 'sq' with lines\n1 1 \n2 4 \n3 9 \ne\n";
    assert_eq!(channel.writes(), vec![expected.to_string()]);
    assert_eq!(reply, expected);
    assert!(session.pending_series().is_empty());
    assert!(session.is_initialized());
    assert_eq!(session.mode(), PlotMode::TwoD);
}

#[test]
fn test_series_writes_one_record_per_sample_before_sentinel() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    let xs: Vec<f64> = (0..50).map(f64::from).collect();
    let ys: Vec<f64> = xs.iter().map(|x| x.sqrt()).collect();

    session.add_series(&xs, &ys, "y = sqrt(x)").unwrap();
    session.plot().unwrap();

    let lines = channel.lines();
    assert_eq!(lines.first().unwrap(), "plot '-' using 1:2 title 'y = sqrt(x)' with lines");
    assert_eq!(lines.last().unwrap(), "e");
    let data = &lines[1..lines.len() - 1];
    assert_eq!(data.len(), xs.len());

    let formatter = Formatter::default();
    for (i, line) in data.iter().enumerate() {
        let expected = formatter.format_all(&[Value::Scalar(xs[i]), Value::Scalar(ys[i])]);
        assert_eq!(line, &expected);
    }
}

#[test]
fn test_multiple_series_get_one_clause_each() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.add_series(&[0.0, 1.0], &[0.0, 1.0], "y = x").unwrap();
    session.add_series(&[0.0, 1.0], &[0.0, 2.0], "y = 2x").unwrap();
    session.plot().unwrap();

    assert_eq!(
        channel.writes()[0],
        "plot '-' using 1:2 title 'y = x' with lines, '-' using 1:2 title 'y = 2x' with lines\n\
         0 0 \n1 1 \ne\n\
         0 0 \n1 2 \ne\n"
    );
}

#[test]
fn test_line_style_applies_to_every_clause() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.set_line_style("points");
    assert_eq!(session.line_style(), "points");

    session.add_point_2d([1.0, 2.0], "a");
    session.add_point_2d([3.0, 4.0], "b");
    session.plot().unwrap();

    assert!(channel.writes()[0].starts_with(
        "plot '-' using 1:2 title 'a' with points, '-' using 1:2 title 'b' with points\n"
    ));
}

#[test]
fn test_configured_style_and_precision() {
    let config = TestConfigBuilder::new()
        .line_style("linespoints")
        .precision(3)
        .build();
    let (mut session, channel) = recording_session(&config);

    session.plot_point([std::f64::consts::PI, 2.0]).unwrap();

    assert_eq!(
        channel.writes()[0],
        "plot '-' using 1:2 title '' with linespoints\n3.14 2 \ne\n"
    );
}

#[test]
fn test_plot_raw_is_sent_verbatim() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.plot_raw("1 1\n2 4\n3 9\n").unwrap();

    assert_eq!(
        channel.writes(),
        vec!["plot '-' using 1:2 title '' with lines\n1 1\n2 4\n3 9\ne\n".to_string()]
    );
}

// ── Setup / replot state machine ────────────────────────────────────

#[test]
fn test_second_flush_in_same_mode_replots() {
    let (mut session, channel) = recording_session(&GraphConfig::default());

    session.plot_series(&[1.0], &[1.0], "first").unwrap();
    session.plot_series(&[1.0, 2.0], &[1.0, 4.0], "ignored").unwrap();

    let writes = channel.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes[0].starts_with("plot '-' using 1:2 title 'first' with lines\n"));
    assert_eq!(writes[1], "replot\n1 1 \n2 4 \ne\n");

    let transcript = channel.transcript();
    assert_eq!(transcript.matches("plot '-'").count(), 1);
    assert_eq!(transcript.matches("replot\n").count(), 1);
}

#[test]
fn test_switch_to_3d_clears_and_sets_up_again() {
    let (mut session, channel) = recording_session(&GraphConfig::default());

    session.plot_series(&[1.0, 2.0], &[3.0, 4.0], "flat").unwrap();
    assert!(session.is_initialized());

    session.add_line_series_3d(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], "diag");
    session.plot_3d().unwrap();

    let writes = channel.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[1], "clear\n");
    assert_eq!(
        writes[2],
        "splot '-' using 1:2:3 title 'diag' with lines\n0 0 0 \n1 1 1 \ne\n"
    );
    assert_eq!(session.mode(), PlotMode::ThreeD);
    assert!(session.is_initialized());
}

#[test]
fn test_first_3d_flush_clears_from_initial_2d_mode() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    assert_eq!(session.mode(), PlotMode::TwoD);
    assert!(!session.is_initialized());

    session.plot_point_3d([1.0, 2.0, 3.0]).unwrap();

    let writes = channel.writes();
    assert_eq!(writes[0], "clear\n");
    assert!(writes[1].starts_with("splot '-' using 1:2:3 title '' with lines\n"));
}

#[test]
fn test_switch_back_to_2d_clears_and_sets_up_again() {
    let (mut session, channel) = recording_session(&GraphConfig::default());

    session.plot_line_3d(&helix(4), "helix").unwrap();
    session.plot_line_3d(&helix(5), "helix").unwrap();
    session.plot_series(&[1.0], &[2.0], "back").unwrap();

    let writes = channel.writes();
    assert_eq!(writes[0], "clear\n");
    assert!(writes[1].starts_with("splot "));
    assert!(writes[2].starts_with("replot\n"));
    assert_eq!(writes[3], "clear\n");
    assert!(writes[4].starts_with("plot '-' using 1:2 title 'back' with lines\n"));
}

// ── 3D series ───────────────────────────────────────────────────────

#[test]
fn test_vector_clauses_follow_line_clauses() {
    let (mut session, channel) = recording_session(&GraphConfig::default());

    session.add_line_series_3d(&[[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]], "path");
    session.add_vector_series_3d([1.0, 1.0, 1.0], [1.0, 0.0, 0.0], "heading");
    assert_eq!(session.pending_vector_series().len(), 1);
    session.plot_3d().unwrap();

    assert_eq!(
        channel.writes()[1],
        "splot '-' using 1:2:3 title 'path' with lines, \
         '-' using 1:2:3:4:5:6 title 'heading' with vectors filled head lw 2\n\
         1 1 1 \n2 2 2 \ne\n\
         1 1 1 1 0 0 \ne\n"
    );
    assert!(session.pending_vector_series().is_empty());
}

#[test]
fn test_vectors_alone_can_be_plotted() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.add_vector_series_3d([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], "up");
    session.plot_3d().unwrap();

    assert_eq!(
        channel.writes()[1],
        "splot '-' using 1:2:3:4:5:6 title 'up' with vectors filled head lw 2\n0 0 0 0 0 1 \ne\n"
    );
}

#[test]
fn test_sparse_series_keeps_final_point() {
    let points = helix(23);
    let (mut session, channel) = recording_session(&GraphConfig::default());

    session
        .add_sparse_line_series_3d(&points, 5, "sparse")
        .unwrap();
    session.plot_3d().unwrap();

    let formatter = Formatter::default();
    let lines = channel.lines();
    let data: Vec<&String> = lines
        .iter()
        .skip_while(|l| !l.starts_with("splot"))
        .skip(1)
        .take_while(|l| l.as_str() != "e")
        .collect();

    // Every fifth point up to index 20, then the whole tail.
    let expected: Vec<String> = [0, 5, 10, 15, 20, 21, 22]
        .into_iter()
        .map(|i| formatter.format(points[i]))
        .collect();
    assert_eq!(data, expected.iter().collect::<Vec<_>>());
}

#[test]
fn test_sparse_series_rejects_zero_stride() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    let result = session.add_sparse_line_series_3d(&helix(3), 0, "");
    assert!(matches!(result, Err(PlotError::InvalidStride)));
    assert!(session.pending_series().is_empty());
    assert!(channel.writes().is_empty());
}

#[test]
fn test_plot_lines_3d_queues_every_line() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.plot_lines_3d(&[helix(2), helix(3)]).unwrap();

    let setup = &channel.writes()[1];
    assert_eq!(setup.matches("'-' using 1:2:3 title ''").count(), 2);
    assert_eq!(setup.matches("e\n").count(), 2);
}

// ── Animation ───────────────────────────────────────────────────────

#[test]
fn test_animate_replots_growing_prefix() {
    let (mut session, channel) = echoing_session(&GraphConfig::default());
    let reply = session.animate(&[1.0, 2.0, 3.0], &[1.0, 4.0, 9.0]).unwrap();

    let writes = channel.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0], "plot '-' using 1:2 title '' with lines\n1 1 \ne\n");
    assert_eq!(writes[1], "replot\n1 1 \n2 4 \ne\n");
    assert_eq!(writes[2], "replot\n1 1 \n2 4 \n3 9 \ne\n");
    assert_eq!(reply, channel.transcript());
}

#[test]
fn test_animate_line_3d_replots_each_point() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.animate_line_3d(&helix(4)).unwrap();

    let transcript = channel.transcript();
    assert_eq!(transcript.matches("splot").count(), 1);
    assert_eq!(transcript.matches("replot\n").count(), 3);
}

// ── File output ─────────────────────────────────────────────────────

#[test]
fn test_image_sequence_names_frames_in_order() {
    let out = TestOutputDir::new();
    let (mut session, channel) = recording_session(&out.builder().build());

    session.enable_image_sequence_output("name").unwrap();
    assert!(std::path::Path::new(&out.path).is_dir());
    assert_eq!(
        session.output_mode(),
        &OutputMode::ImageSequence {
            name: "name".to_string()
        }
    );

    for i in 0..3 {
        session.add_point_3d([f64::from(i), 0.0, 0.0], "p");
        session.plot_3d().unwrap();
    }

    let outputs: Vec<String> = channel
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("set output"))
        .collect();
    for (i, line) in outputs.iter().take(3).enumerate() {
        assert_eq!(line, &format!("set output '{}/name{:05}.png'", out.path, i + 1));
    }
    assert_eq!(channel.transcript().matches("set terminal pngcairo").count(), 1);
    assert_eq!(session.frame_id(), 4);
}

#[test]
fn test_image_sequence_setup_precedes_splot() {
    let out = TestOutputDir::new();
    let (mut session, channel) = recording_session(&out.builder().build());
    session.enable_image_sequence_output("frame").unwrap();
    session.plot_point_3d([1.0, 1.0, 1.0]).unwrap();

    let writes = channel.writes();
    assert_eq!(writes[0], "clear\n");
    assert!(writes[1].starts_with(&format!(
        "set terminal pngcairo\nset output '{}/frame00001.png'\nsplot ",
        out.path
    )));
    assert_eq!(writes[2], format!("set output '{}/frame00002.png'\n", out.path));
}

#[test]
fn test_gif_output_applied_once_on_first_3d_setup() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.enable_gif_output("anim");

    session.plot_point_3d([1.0, 2.0, 3.0]).unwrap();
    session.plot_point_3d([2.0, 3.0, 4.0]).unwrap();

    let writes = channel.writes();
    assert!(writes[1].starts_with(
        "set terminal gif animate delay .001\nset output 'anim.gif'\nsplot '-' using 1:2:3"
    ));
    assert_eq!(writes[2], "replot\n2 3 4 \ne\n");
    assert_eq!(channel.transcript().matches("set terminal").count(), 1);
}

#[test]
fn test_2d_flush_never_applies_output() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.enable_gif_output("anim");
    session.plot_point([1.0, 1.0]).unwrap();

    assert!(!channel.transcript().contains("set terminal"));
}

#[test]
fn test_output_modes_are_exclusive() {
    let (diagnostics, _guard) = capture_diagnostics();

    let out = TestOutputDir::new();
    let (mut session, _channel) = recording_session(&out.builder().build());
    session.enable_image_sequence_output("frames").unwrap();
    session.enable_gif_output("anim");

    assert_eq!(
        session.output_mode(),
        &OutputMode::ImageSequence {
            name: "frames".to_string()
        }
    );
    let entries = diagnostics.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("Output mode already configured"));
}

#[test]
fn test_gif_first_blocks_image_sequence() {
    let out = TestOutputDir::new();
    let (mut session, _channel) = recording_session(&out.builder().build());
    session.enable_gif_output("anim");
    session.enable_image_sequence_output("frames").unwrap();

    assert_eq!(
        session.output_mode(),
        &OutputMode::Gif {
            name: "anim".to_string()
        }
    );
    assert!(!std::path::Path::new(&out.path).exists());
}

#[test]
fn test_close_output_sends_unset() {
    let (mut session, channel) = echoing_session(&GraphConfig::default());
    let reply = session.close_output();
    assert_eq!(channel.writes(), vec!["unset output\n".to_string()]);
    assert_eq!(reply, "unset output\n");
}

// ── Contract violations and transport failures ─────────────────────

#[test]
fn test_mismatched_lengths_are_rejected() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    let err = session.add_series(&[1.0, 2.0], &[1.0], "bad").unwrap_err();
    assert!(matches!(err, PlotError::LengthMismatch { xs: 2, ys: 1 }));
    assert!(session.pending_series().is_empty());

    assert!(session.animate(&[1.0], &[]).is_err());
    assert!(channel.writes().is_empty());
}

#[test]
fn test_flush_with_nothing_queued_is_rejected() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    assert!(matches!(session.plot(), Err(PlotError::NothingQueued)));
    assert!(matches!(session.plot_3d(), Err(PlotError::NothingQueued)));
    assert!(channel.writes().is_empty());
    assert!(!session.is_initialized());
}

#[test]
fn test_vectors_in_2d_flush_are_rejected() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.add_vector_series_3d([0.0; 3], [1.0, 0.0, 0.0], "v");
    assert!(matches!(session.plot(), Err(PlotError::VectorsRequire3d)));
    assert!(channel.writes().is_empty());
    assert_eq!(session.pending_vector_series().len(), 1);
}

#[test]
fn test_failed_write_is_logged_and_queue_cleared() {
    let (diagnostics, _guard) = capture_diagnostics();

    let (mut session, channel) = recording_session(&GraphConfig::default());
    channel.fail_writes(true);
    session.add_series(&[1.0], &[1.0], "lost").unwrap();

    let reply = session.plot().unwrap();
    assert_eq!(reply, "");
    assert!(session.pending_series().is_empty());
    assert!(diagnostics.has_errors());
    assert!(channel.writes().is_empty());
}

#[test]
fn test_queued_replies_are_returned_by_flush() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    channel.queue_reply("warning: Skipping data file with no valid points\n");
    let reply = session.plot_point([0.0, 0.0]).unwrap();
    assert_eq!(reply, "warning: Skipping data file with no valid points\n");
    assert_eq!(session.read_reply(), "");
}

// ── Teardown ────────────────────────────────────────────────────────

#[test]
fn test_drop_sends_quit() {
    let (session, channel) = recording_session(&GraphConfig::default());
    drop(session);
    assert_eq!(channel.writes(), vec!["quit\n".to_string()]);
    assert!(channel.is_closed());
}

#[test]
fn test_shutdown_sends_quit_once() {
    let (mut session, channel) = recording_session(&GraphConfig::default());
    session.plot_point([1.0, 1.0]).unwrap();
    assert!(session.is_alive());
    session.shutdown().unwrap();

    let writes = channel.writes();
    assert_eq!(writes.last().unwrap(), "quit\n");
    assert_eq!(writes.iter().filter(|w| *w == "quit\n").count(), 1);
}
