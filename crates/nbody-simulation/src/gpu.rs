//! Submission and readback helpers shared by the store, bridge and engine

use crate::device::GpuContext;
use crate::error::{Result, SimulationError};
use bytemuck::Pod;

/// Encode, submit and report validation / out-of-memory errors as
/// `UpdateFailed`.
pub(crate) fn submit_checked(
    ctx: &GpuContext,
    label: &str,
    encode: impl FnOnce(&mut wgpu::CommandEncoder),
) -> Result<wgpu::SubmissionIndex> {
    ctx.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    encode(&mut encoder);
    let index = ctx.queue.submit(std::iter::once(encoder.finish()));

    let validation = pollster::block_on(ctx.device.pop_error_scope());
    let out_of_memory = pollster::block_on(ctx.device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(error) => Err(SimulationError::UpdateFailed(format!("{label}: {error}"))),
        None => Ok(index),
    }
}

/// One compute pass with a single bind group
pub(crate) fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    workgroups: u32,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(workgroups, 1, 1);
}

/// Map a `MAP_READ` buffer and copy its first `out.len()` elements out.
///
/// Blocks until the GPU has finished every prior submission.
pub(crate) fn map_into<T: Pod>(
    ctx: &GpuContext,
    staging: &wgpu::Buffer,
    out: &mut [T],
) -> Result<()> {
    let size = std::mem::size_of_val(out) as u64;
    let slice = staging.slice(..size);

    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.wait_idle()
        .map_err(|e| SimulationError::Readback(e.to_string()))?;
    rx.recv()
        .map_err(|e| SimulationError::Readback(e.to_string()))?
        .map_err(|e| SimulationError::Readback(e.to_string()))?;

    {
        let data = slice.get_mapped_range();
        out.copy_from_slice(bytemuck::cast_slice(&data));
    }
    staging.unmap();
    Ok(())
}

/// Copy `count` elements of `source` into a fresh staging buffer and read them.
///
/// Debug / test path only: allocates on every call.
pub(crate) fn read_buffer<T: Pod>(
    ctx: &GpuContext,
    source: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<T>> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    submit_checked(ctx, "Readback Encoder", |encoder| {
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
    })
    .map_err(|e| SimulationError::Readback(e.to_string()))?;

    let mut out = vec![T::zeroed(); count];
    map_into(ctx, &staging, &mut out)?;
    Ok(out)
}
