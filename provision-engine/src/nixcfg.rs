// SPDX-License-Identifier: GPL-3.0-only

//! NixOS configuration fragments for the migrated storage layout
//!
//! The bootstrap's apply variant writes these onto the guest; the manual
//! variant prints the same information as an instructions block instead.

use provision_contracts::{ProvisionError, ProvisionErrorKind};
use provision_types::StorageLayoutPlan;

/// Path of the generated fragment on the guest.
pub const FRAGMENT_PATH: &str = "/etc/nixos/storage.nix";

/// Root configuration the fragment is imported from.
pub const ROOT_CONFIG_PATH: &str = "/etc/nixos/configuration.nix";

/// Import line inserted into the root configuration.
const FRAGMENT_IMPORT: &str = "./storage.nix";

/// Early-boot flag so the initrd activates the volume group before the
/// store subvolume is needed.
const INITRD_LVM_FLAG: &str = "boot.initrd.services.lvm.enable = true;";

/// Render the mount-point fragment: one `fileSystems` block per subvolume,
/// in plan order, each mounting the logical volume with the subvolume,
/// compression and noatime options.
pub fn render_mount_fragment(plan: &StorageLayoutPlan) -> String {
    let device = plan.lv_device_path();
    let mut fragment = String::from("# Mounts for the migrated data volume. Generated; do not edit.\n{\n");

    for (index, subvolume) in plan.subvolumes.iter().enumerate() {
        if index > 0 {
            fragment.push('\n');
        }
        fragment.push_str(&format!(
            concat!(
                "  fileSystems.\"{mount}\" = {{\n",
                "    device = \"{device}\";\n",
                "    fsType = \"btrfs\";\n",
                "    options = [ \"subvol={name}\" \"compress=zstd\" \"noatime\" ];\n",
                "  }};\n"
            ),
            mount = subvolume.mount_point,
            device = device,
            name = subvolume.name,
        ));
    }

    fragment.push_str("}\n");
    fragment
}

/// Rewrite the root configuration to import the fragment and enable LVM at
/// early boot. Already-rewritten input passes through unchanged.
pub fn rewrite_configuration(existing: &str) -> Result<String, ProvisionError> {
    let mut rewritten = if existing.contains(FRAGMENT_IMPORT) {
        existing.to_string()
    } else {
        let opener = existing.lines().find(|line| line.trim_start().starts_with("imports = ["));
        let Some(opener) = opener else {
            return Err(ProvisionError::new(
                ProvisionErrorKind::InvalidInput,
                format!("{ROOT_CONFIG_PATH} has no imports list to extend"),
            ));
        };

        let indent: String = opener
            .chars()
            .take_while(|character| character.is_whitespace())
            .collect();
        let import_line = format!("{indent}  {FRAGMENT_IMPORT}\n");
        let mut output = String::with_capacity(existing.len() + import_line.len());
        for line in existing.lines() {
            output.push_str(line);
            output.push('\n');
            if line == opener {
                output.push_str(&import_line);
            }
        }
        output
    };

    if !rewritten.contains(INITRD_LVM_FLAG) {
        let Some(closing) = rewritten.rfind('}') else {
            return Err(ProvisionError::new(
                ProvisionErrorKind::InvalidInput,
                format!("{ROOT_CONFIG_PATH} has no closing brace"),
            ));
        };
        rewritten.insert_str(closing, &format!("  {INITRD_LVM_FLAG}\n"));
    }

    Ok(rewritten)
}

/// Human-readable instructions the manual variant prints after the marker
/// is written: the mount configuration the operator must apply persistently.
pub fn render_manual_instructions(plan: &StorageLayoutPlan) -> String {
    let mut instructions = format!(
        concat!(
            "Storage bootstrap finished. The data volume is assembled but not yet\n",
            "part of the system configuration. Add the following to {root} (and\n",
            "enable LVM in the initrd with `{flag}`),\n",
            "then rebuild and reboot:\n",
            "\n"
        ),
        root = ROOT_CONFIG_PATH,
        flag = INITRD_LVM_FLAG.trim_end_matches(';'),
    );
    instructions.push_str(&render_mount_fragment(plan));
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_block_per_subvolume_in_order() {
        let fragment = render_mount_fragment(&StorageLayoutPlan::data_volume());

        let nix_at = fragment.find("fileSystems.\"/nix\"").expect("nix block");
        let home_at = fragment.find("fileSystems.\"/home\"").expect("home block");
        assert!(nix_at < home_at);
        assert_eq!(fragment.matches("device = \"/dev/datavg/datalv\";").count(), 2);
        assert_eq!(
            fragment
                .matches("options = [ \"subvol=@nix\" \"compress=zstd\" \"noatime\" ];")
                .count(),
            1
        );
    }

    #[test]
    fn rewrites_imports_and_initrd_flag() {
        let existing = concat!(
            "{ config, pkgs, ... }:\n",
            "{\n",
            "  imports = [\n",
            "    ./hardware-configuration.nix\n",
            "  ];\n",
            "  networking.hostName = \"builder\";\n",
            "}\n",
        );

        let rewritten = rewrite_configuration(existing).expect("rewritable");
        let import_at = rewritten.find("./storage.nix").expect("import inserted");
        let hardware_at = rewritten.find("./hardware-configuration.nix").expect("kept");
        assert!(import_at < hardware_at);
        assert!(rewritten.contains("boot.initrd.services.lvm.enable = true;"));
        assert!(rewritten.trim_end().ends_with('}'));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let existing = concat!(
            "{\n",
            "  imports = [\n",
            "    ./storage.nix\n",
            "  ];\n",
            "  boot.initrd.services.lvm.enable = true;\n",
            "}\n",
        );

        let rewritten = rewrite_configuration(existing).expect("rewritable");
        assert_eq!(rewritten, existing);
    }

    #[test]
    fn rejects_configuration_without_imports() {
        let error = rewrite_configuration("{ }\n").expect_err("no imports list");
        assert_eq!(error.kind, ProvisionErrorKind::InvalidInput);
    }

    #[test]
    fn instructions_embed_the_fragment() {
        let instructions = render_manual_instructions(&StorageLayoutPlan::data_volume());
        assert!(instructions.contains("fileSystems.\"/home\""));
        assert!(instructions.contains("boot.initrd.services.lvm.enable"));
    }
}
