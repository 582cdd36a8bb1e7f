use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use provision_contracts::{
    ComputeApi, ImageBuild, LaunchRequest, ProvisionError, ProvisionErrorKind, VolumeAttachment,
};
use provision_types::{Arch, ImageArtifact, InstanceHandle, InstanceLifecycle};

/// Public address every fake instance gets once it is running.
const FAKE_PUBLIC_IP: &str = "198.51.100.10";

#[derive(Default)]
struct ComputeState {
    next_id: u32,
    images: Vec<ImageArtifact>,
    uploads: Vec<(String, String)>,
    deleted_objects: Vec<String>,
    deleted_images: Vec<String>,
    fail_delete: BTreeSet<String>,
    lifecycles: VecDeque<InstanceLifecycle>,
    launches: Vec<LaunchRequest>,
    attachments: Vec<(String, u32, String)>,
}

/// In-memory provisioning API.
#[derive(Default)]
pub struct FakeCompute {
    state: Mutex<ComputeState>,
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ComputeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh_id(state: &mut ComputeState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    // --- setup ---

    /// Register an image with a synthetic, strictly increasing timestamp.
    pub fn add_image(&self, arch: Arch, content_hash: &str, display_name: &str) -> String {
        let mut state = self.lock();
        let id = Self::fresh_id(&mut state, "img");
        let sequence = state.images.len() as i64;
        state.images.push(ImageArtifact {
            arch,
            content_hash: content_hash.to_string(),
            image_id: Some(id.clone()),
            display_name: display_name.to_string(),
            time_created: DateTime::<Utc>::from_timestamp(1_700_000_000 + sequence * 3600, 0),
        });
        id
    }

    /// Make deletion of one image id fail.
    pub fn fail_deleting(&self, image_id: &str) {
        self.lock().fail_delete.insert(image_id.to_string());
    }

    /// Script the lifecycle states returned by successive `get_instance`
    /// calls; once exhausted, the instance reports `RUNNING`.
    pub fn script_lifecycle(&self, states: impl IntoIterator<Item = InstanceLifecycle>) {
        self.lock().lifecycles.extend(states);
    }

    // --- inspection ---

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.lock().uploads.clone()
    }

    pub fn deleted_objects(&self) -> Vec<String> {
        self.lock().deleted_objects.clone()
    }

    pub fn deleted_images(&self) -> Vec<String> {
        self.lock().deleted_images.clone()
    }

    pub fn image_ids(&self) -> Vec<String> {
        self.lock()
            .images
            .iter()
            .filter_map(|image| image.image_id.clone())
            .collect()
    }

    pub fn launches(&self) -> usize {
        self.lock().launches.len()
    }

    pub fn attachments(&self) -> Vec<(String, u32, String)> {
        self.lock().attachments.clone()
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn launch_instance(
        &self,
        request: &LaunchRequest,
    ) -> Result<InstanceHandle, ProvisionError> {
        let mut state = self.lock();
        let id = Self::fresh_id(&mut state, "inst");
        state.launches.push(request.clone());
        Ok(InstanceHandle {
            id,
            public_ip: None,
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<(InstanceHandle, InstanceLifecycle), ProvisionError> {
        let mut state = self.lock();
        let lifecycle = state
            .lifecycles
            .pop_front()
            .unwrap_or(InstanceLifecycle::Running);
        let public_ip = lifecycle
            .is_running()
            .then(|| FAKE_PUBLIC_IP.to_string());
        Ok((
            InstanceHandle {
                id: instance_id.to_string(),
                public_ip,
            },
            lifecycle,
        ))
    }

    async fn attach_data_volume(
        &self,
        instance_id: &str,
        size_gbs: u32,
        display_name: &str,
    ) -> Result<VolumeAttachment, ProvisionError> {
        let mut state = self.lock();
        let volume_id = Self::fresh_id(&mut state, "vol");
        let attachment_id = Self::fresh_id(&mut state, "att");
        state
            .attachments
            .push((instance_id.to_string(), size_gbs, display_name.to_string()));
        Ok(VolumeAttachment {
            volume_id,
            attachment_id,
        })
    }

    async fn find_images(
        &self,
        content_hash: &str,
        arch: Arch,
    ) -> Result<Vec<ImageArtifact>, ProvisionError> {
        Ok(self
            .lock()
            .images
            .iter()
            .filter(|image| image.content_hash == content_hash && image.arch == arch)
            .cloned()
            .collect())
    }

    async fn list_managed_images(&self) -> Result<Vec<ImageArtifact>, ProvisionError> {
        Ok(self.lock().images.clone())
    }

    async fn put_object(
        &self,
        object_name: &str,
        local_path: &str,
    ) -> Result<(), ProvisionError> {
        self.lock()
            .uploads
            .push((object_name.to_string(), local_path.to_string()));
        Ok(())
    }

    async fn delete_object(&self, object_name: &str) -> Result<(), ProvisionError> {
        self.lock().deleted_objects.push(object_name.to_string());
        Ok(())
    }

    async fn create_image_from_object(
        &self,
        object_name: &str,
        display_name: &str,
        content_hash: &str,
        arch: Arch,
    ) -> Result<String, ProvisionError> {
        let _ = object_name;
        let mut state = self.lock();
        let id = Self::fresh_id(&mut state, "img");
        let sequence = state.images.len() as i64;
        state.images.push(ImageArtifact {
            arch,
            content_hash: content_hash.to_string(),
            image_id: Some(id.clone()),
            display_name: display_name.to_string(),
            time_created: DateTime::<Utc>::from_timestamp(1_700_000_000 + sequence * 3600, 0),
        });
        Ok(id)
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        if state.fail_delete.contains(image_id) {
            return Err(ProvisionError::new(
                ProvisionErrorKind::Busy,
                format!("image {image_id} is in use"),
            ));
        }
        state
            .images
            .retain(|image| image.image_id.as_deref() != Some(image_id));
        state.deleted_images.push(image_id.to_string());
        Ok(())
    }
}

/// `ImageBuild` whose identity and artifact are fixed up front.
pub struct FakeImageBuild {
    content_hash: String,
    image_file: PathBuf,
    realized: Mutex<u32>,
}

impl FakeImageBuild {
    pub fn new(content_hash: &str) -> Self {
        Self {
            content_hash: content_hash.to_string(),
            image_file: PathBuf::from("/build/nixos.qcow2"),
            realized: Mutex::new(0),
        }
    }

    /// How many times the expensive build path ran.
    pub fn realize_count(&self) -> u32 {
        *self.realized.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ImageBuild for FakeImageBuild {
    fn identity(&self, _arch: Arch) -> Result<String, ProvisionError> {
        Ok(self.content_hash.clone())
    }

    fn realize(&self, _arch: Arch) -> Result<PathBuf, ProvisionError> {
        *self.realized.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(self.image_file.clone())
    }
}
