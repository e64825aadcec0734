use crate::gfx::{self, CpuDescriptorHandle, GpuDescriptorHandle, Heap, HeapInfo, HeapType};
use crate::{setup_err, Error, Result};

/// The three fixed capacity heaps: one render target view per back buffer, a single depth
/// stencil view and a single shader visible constant buffer view.
pub struct DescriptorHeaps<D: gfx::Device> {
    rtv: D::Heap,
    dsv: D::Heap,
    cbv: D::Heap,
    rtv_increment: usize,
    dsv_increment: usize,
    cbv_increment: usize,
}

fn slot_in_range(heap_name: &str, index: usize, capacity: usize) -> Result<()> {
    if index >= capacity {
        return Err(Error::Validation(format!(
            "{} heap slot {} is out of range (capacity {})",
            heap_name, index, capacity
        )));
    }
    Ok(())
}

impl<D: gfx::Device> DescriptorHeaps<D> {
    pub fn create(device: &D, buffer_count: u32) -> Result<Self> {
        let rtv = device
            .create_heap(&HeapInfo {
                heap_type: HeapType::RenderTarget,
                num_descriptors: buffer_count as usize,
            })
            .map_err(setup_err("create rtv heap"))?;
        let dsv = device
            .create_heap(&HeapInfo {
                heap_type: HeapType::DepthStencil,
                num_descriptors: 1,
            })
            .map_err(setup_err("create dsv heap"))?;
        let cbv = device
            .create_heap(&HeapInfo {
                heap_type: HeapType::Shader,
                num_descriptors: 1,
            })
            .map_err(setup_err("create cbv heap"))?;

        Ok(DescriptorHeaps {
            rtv,
            dsv,
            cbv,
            rtv_increment: device.get_descriptor_increment_size(HeapType::RenderTarget),
            dsv_increment: device.get_descriptor_increment_size(HeapType::DepthStencil),
            cbv_increment: device.get_descriptor_increment_size(HeapType::Shader),
        })
    }

    /// Render target view slot for back buffer `index`.
    pub fn rtv_handle(&self, index: u32) -> Result<CpuDescriptorHandle> {
        slot_in_range("rtv", index as usize, self.rtv.get_capacity())?;
        Ok(gfx::descriptor_handle_at(
            self.rtv.get_cpu_handle_start(),
            index as usize,
            self.rtv_increment,
        ))
    }

    pub fn dsv_handle(&self) -> CpuDescriptorHandle {
        gfx::descriptor_handle_at(self.dsv.get_cpu_handle_start(), 0, self.dsv_increment)
    }

    pub fn cbv_cpu_handle(&self) -> CpuDescriptorHandle {
        gfx::descriptor_handle_at(self.cbv.get_cpu_handle_start(), 0, self.cbv_increment)
    }

    pub fn cbv_gpu_handle(&self) -> Result<GpuDescriptorHandle> {
        let base = self
            .cbv
            .get_gpu_handle_start()
            .ok_or_else(|| Error::Validation(String::from("cbv heap is not shader visible")))?;
        Ok(gfx::gpu_descriptor_handle_at(base, 0, self.cbv_increment))
    }

    pub fn rtv_heap(&self) -> &D::Heap {
        &self.rtv
    }

    pub fn dsv_heap(&self) -> &D::Heap {
        &self.dsv
    }

    pub fn cbv_heap(&self) -> &D::Heap {
        &self.cbv
    }

    pub fn rtv_increment(&self) -> usize {
        self.rtv_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::null;
    use crate::gfx::{Device, DeviceInfo};

    #[test]
    fn rtv_slots_are_base_plus_index_times_increment() {
        let device = null::Device::create(&DeviceInfo::default()).unwrap();
        let heaps = DescriptorHeaps::create(&device, 3).unwrap();
        let base = heaps.rtv_heap().get_cpu_handle_start();
        let inc = heaps.rtv_increment();
        for i in 0..3 {
            assert_eq!(heaps.rtv_handle(i).unwrap().ptr, base.ptr + i as usize * inc);
        }
        assert!(heaps.rtv_handle(3).is_err());
    }

    #[test]
    fn heap_capacities() {
        let device = null::Device::create(&DeviceInfo::default()).unwrap();
        let heaps = DescriptorHeaps::create(&device, 2).unwrap();
        assert_eq!(heaps.rtv_heap().get_capacity(), 2);
        assert_eq!(heaps.dsv_heap().get_capacity(), 1);
        assert_eq!(heaps.cbv_heap().get_capacity(), 1);
        assert!(heaps.cbv_heap().get_heap_type().is_shader_visible());
        assert!(heaps.dsv_heap().get_gpu_handle_start().is_none());
        assert!(heaps.cbv_gpu_handle().is_ok());
    }
}
