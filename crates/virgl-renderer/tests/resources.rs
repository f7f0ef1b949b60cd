mod common;

use common::*;
use pretty_assertions::assert_eq;
use virgl_core::caps::{cap_set_info, CapsSet};
use virgl_core::{ContextErrorKind, PipeBox, RendererConfig, RendererError};
use virgl_renderer::{Iov, SurfaceArgs, TransferRequest};

fn request(handle: u32, ctx_id: u32, pbox: PipeBox) -> TransferRequest {
    TransferRequest {
        handle,
        ctx_id,
        level: 0,
        stride: 0,
        layer_stride: 0,
        pbox,
        offset: 0,
    }
}

#[test]
fn buffer_write_then_read() {
    let mut h = harness();
    h.renderer.resource_create(&buffer_args(1, 256), None).unwrap();
    let data = pattern(256);

    h.renderer
        .transfer_write(&request(1, 0, PipeBox::new(0, 0, 0, 256, 1, 1)), Some(&Iov::from(data.clone())))
        .unwrap();
    let mut out = Iov::new(vec![vec![0; 100], vec![0; 156]]);
    h.renderer
        .transfer_read(&request(1, 0, PipeBox::new(0, 0, 0, 256, 1, 1)), Some(&mut out))
        .unwrap();
    assert_eq!(out.to_vec(), data);

    // A partial read lands at the request offset.
    let mut part = Iov::zeroed(32);
    let req = TransferRequest {
        offset: 16,
        ..request(1, 0, PipeBox::new(8, 0, 0, 16, 1, 1))
    };
    h.renderer.transfer_read(&req, Some(&mut part)).unwrap();
    assert_eq!(&part.to_vec()[16..], &data[8..24]);
}

#[test]
fn sub_data_uploads_match_mapped_uploads() {
    let mut h = harness_with(RendererConfig {
        use_sub_data: true,
        ..Default::default()
    });
    h.renderer.resource_create(&buffer_args(1, 64), None).unwrap();
    let data = pattern(64);
    h.renderer
        .transfer_write(&request(1, 0, PipeBox::new(0, 0, 0, 64, 1, 1)), Some(&Iov::from(data.clone())))
        .unwrap();
    let buffer = h.renderer.resource_get_info(1).unwrap().gl_id;
    assert_eq!(h.gl.buffer_contents(buffer), Some(data));
}

#[test]
fn transfers_default_to_the_attached_backing() {
    let mut h = harness();
    h.renderer.resource_create(&buffer_args(1, 16), None).unwrap();
    let box16 = PipeBox::new(0, 0, 0, 16, 1, 1);
    assert_eq!(
        h.renderer.transfer_write(&request(1, 0, box16), None),
        Err(RendererError::Inval)
    );

    h.renderer.resource_attach_iov(1, Iov::from(pattern(16))).unwrap();
    h.renderer.transfer_write(&request(1, 0, box16), None).unwrap();
    let backing = h.renderer.resource_detach_iov(1).unwrap();
    assert_eq!(backing.to_vec(), pattern(16));

    h.renderer.resource_attach_iov(1, Iov::zeroed(16)).unwrap();
    h.renderer.transfer_read(&request(1, 0, box16), None).unwrap();
    assert_eq!(h.renderer.resource_detach_iov(1).unwrap().to_vec(), pattern(16));
}

#[test]
fn texture_write_copy_read() {
    let mut h = harness();
    h.renderer.resource_create(&rgba8_args(1, 64, 64), None).unwrap();
    h.renderer.resource_create(&rgba8_args(2, 64, 64), None).unwrap();
    let full = PipeBox::new(0, 0, 0, 64, 64, 1);
    let data = pattern(64 * 64 * 4);

    h.renderer
        .transfer_write(&request(1, 0, full), Some(&Iov::from(data.clone())))
        .unwrap();
    h.renderer
        .resource_copy_region(0, 2, 0, [0, 0, 0], 1, 0, &full)
        .unwrap();
    let mut out = Iov::zeroed(data.len());
    h.renderer.transfer_read(&request(2, 0, full), Some(&mut out)).unwrap();
    assert_eq!(out.to_vec(), data);
}

#[test]
fn out_of_bounds_transfers_fail() {
    let mut h = harness();
    h.renderer.resource_create(&rgba8_args(1, 16, 16), None).unwrap();
    let mut out = Iov::zeroed(17 * 16 * 4);
    let err = h
        .renderer
        .transfer_read(&request(1, 0, PipeBox::new(0, 0, 0, 17, 16, 1)), Some(&mut out))
        .unwrap_err();
    assert_eq!(err, RendererError::Inval);

    // An iov too small for the box is a context error.
    let mut small = Iov::zeroed(16);
    let err = h
        .renderer
        .transfer_read(&request(1, 0, PipeBox::new(0, 0, 0, 16, 16, 1)), Some(&mut small))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ContextErrorKind::TransferIovBounds));
    assert_eq!(h.renderer.context_error(0), Some(ContextErrorKind::TransferIovBounds));

    // Context 0 records the error but keeps serving transfers.
    let mut out = Iov::zeroed(16 * 16 * 4);
    h.renderer
        .transfer_read(&request(1, 0, PipeBox::new(0, 0, 0, 16, 16, 1)), Some(&mut out))
        .unwrap();
}

#[test]
fn sub_box_transfers_use_level_strides() {
    let mut h = harness();
    h.renderer.resource_create(&rgba8_args(1, 16, 16), None).unwrap();
    let data = pattern(16 * 16 * 4);
    let pbox = PipeBox::new(2, 2, 0, 4, 4, 1);

    h.renderer
        .transfer_write(&request(1, 0, pbox), Some(&Iov::from(data.clone())))
        .unwrap();
    let mut out = Iov::zeroed(16 * 16 * 4);
    h.renderer.transfer_read(&request(1, 0, pbox), Some(&mut out)).unwrap();

    // Rows sit one level row (64 bytes) apart in the guest buffer both ways.
    let out = out.to_vec();
    for row in 0..4 {
        let at = row * 64;
        assert_eq!(out[at..at + 16], data[at..at + 16], "row {row}");
    }
    assert!(out[16..64].iter().all(|&b| b == 0));
}

#[test]
fn resource_handles_are_unique() {
    let mut h = harness();
    h.renderer.resource_create(&buffer_args(1, 16), None).unwrap();
    assert_eq!(
        h.renderer.resource_create(&buffer_args(1, 16), None),
        Err(RendererError::Inval)
    );
    h.renderer.resource_unref(1).unwrap();
    assert_eq!(h.renderer.resource_unref(1), Err(RendererError::Inval));
    assert_eq!(h.gl.live_buffers(), 0);
    assert_eq!(h.gl.bad_deletes(), 0);
}

#[test]
fn attachments_are_weak() {
    let mut h = harness();
    h.renderer.create_context(1, "a").unwrap();
    h.renderer.create_context(2, "b").unwrap();
    h.renderer.resource_create(&rgba8_args(7, 16, 16), None).unwrap();

    h.renderer.ctx_attach_resource(1, 7).unwrap();
    h.renderer.ctx_attach_resource(2, 7).unwrap();
    assert_eq!(h.renderer.resource_attach_count(7), 2);
    h.renderer.ctx_detach_resource(2, 7).unwrap();
    assert_eq!(h.renderer.resource_attach_count(7), 1);

    // Only attached resources resolve in a guest context.
    let surface = SurfaceArgs {
        handle: 1,
        res_handle: 7,
        format: virgl_core::VirglFormat::R8G8B8A8_UNORM as u32,
        ..Default::default()
    };
    let err = h.renderer.create_surface(2, &surface).unwrap_err();
    assert_eq!(err.kind(), Some(ContextErrorKind::IllegalResource));
    h.renderer.create_surface(1, &surface).unwrap();

    // The surface keeps the texture alive past the global unref.
    h.renderer.resource_unref(7).unwrap();
    assert_eq!(h.gl.live_textures(), 1);
    h.renderer.destroy_context(1);
    assert_eq!(h.gl.live_textures(), 0);
    assert_eq!(h.gl.bad_deletes(), 0);
}

#[test]
fn fences_signal_in_submission_order() {
    let mut h = harness();
    h.renderer.create_fence(1, 0).unwrap();
    h.renderer.create_fence(2, 0).unwrap();
    h.gl.set_auto_signal(false);
    h.renderer.create_fence(3, 0).unwrap();
    h.renderer.create_fence(4, 0).unwrap();

    h.renderer.poll();
    assert_eq!(h.callbacks.fences(), vec![2]);
    h.renderer.poll();
    assert_eq!(h.callbacks.fences(), vec![2]);

    h.gl.signal_all();
    h.renderer.poll();
    assert_eq!(h.callbacks.fences(), vec![2, 4]);
    assert_eq!(h.renderer.get_poll_fd(), -1);
}

#[test]
fn context_lifecycle() {
    let mut h = harness();
    assert_eq!(h.renderer.create_context(0, "dup"), Err(RendererError::Inval));
    h.renderer.create_context(3, "guest").unwrap();
    assert_eq!(h.renderer.create_context(3, "again"), Err(RendererError::Inval));
    let live = h.callbacks.live_contexts();

    assert!(h.renderer.hw_switch_context(3));
    assert_eq!(h.renderer.current_context(), 3);
    assert!(!h.renderer.hw_switch_context(9));

    h.renderer.create_sub_ctx(3, 1).unwrap();
    assert_eq!(h.callbacks.live_contexts(), live + 1);
    h.renderer.destroy_context(3);
    assert_eq!(h.callbacks.live_contexts(), live - 1);
    assert_eq!(h.renderer.current_context(), 0);

    // Context 0 cannot go away.
    h.renderer.destroy_context(0);
    h.renderer.force_ctx_0();
    h.renderer.resource_create(&buffer_args(1, 4), None).unwrap();
}

#[test]
fn reset_drops_everything() {
    let mut h = harness();
    h.renderer.create_context(1, "guest").unwrap();
    h.renderer.resource_create(&rgba8_args(1, 8, 8), None).unwrap();
    h.renderer.resource_create(&buffer_args(2, 8), None).unwrap();
    h.gl.set_auto_signal(false);
    h.renderer.create_fence(5, 1).unwrap();

    h.renderer.reset().unwrap();
    assert_eq!(h.gl.live_textures(), 0);
    assert_eq!(h.gl.live_buffers(), 0);
    assert_eq!(h.renderer.resource_get_info(1), Err(RendererError::Inval));
    h.gl.signal_all();
    h.renderer.poll();
    assert!(h.callbacks.fences().is_empty());

    // Handles are free again.
    h.renderer.resource_create(&buffer_args(2, 8), None).unwrap();
}

#[test]
fn capability_sets() {
    let h = harness();
    assert_eq!(h.renderer.get_cap_set(2), cap_set_info(2));
    assert_eq!(h.renderer.get_cap_set(9), (0, 0));

    let mut caps = CapsSet::default();
    h.renderer.fill_caps(2, 0, &mut caps);
    assert_eq!(caps.v1().max_version, 2);
    assert!(caps.v1().max_render_targets >= 1);
}

#[test]
fn cursor_contents_are_top_down() {
    let mut h = harness();
    h.renderer.resource_create(&rgba8_args(1, 2, 2), None).unwrap();
    let rows: Vec<u8> = (0..16).collect();
    h.renderer
        .transfer_write(&request(1, 0, PipeBox::new(0, 0, 0, 2, 2, 1)), Some(&Iov::from(rows.clone())))
        .unwrap();
    let (data, width, height) = h.renderer.get_cursor_contents(1).unwrap();
    assert_eq!((width, height), (2, 2));
    assert_eq!(&data[..8], &rows[8..]);
    assert_eq!(&data[8..], &rows[..8]);
}
