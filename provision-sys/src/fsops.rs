//! Mount, probe, and copy command lines for the guest filesystem

use crate::shell::quote;

pub fn mount(device: &str, target: &str, options: &[String]) -> String {
    if options.is_empty() {
        format!("mount {} {}", quote(device), quote(target))
    } else {
        format!(
            "mount -o {} {} {}",
            quote(&options.join(",")),
            quote(device),
            quote(target)
        )
    }
}

pub fn umount(target: &str) -> String {
    format!("umount {}", quote(target))
}

pub fn mkdir_p(path: &str) -> String {
    format!("mkdir -p {}", quote(path))
}

pub fn rmdir(path: &str) -> String {
    format!("rmdir {}", quote(path))
}

/// Existence probe; exit status is the answer.
pub fn test_exists(path: &str) -> String {
    format!("test -e {}", quote(path))
}

/// Emptiness probe: succeeds with output iff the directory has entries.
pub fn list_entries(path: &str) -> String {
    format!("ls -A {}", quote(path))
}

pub fn write_file(path: &str, contents: &str) -> String {
    let body = if contents.is_empty() || contents.ends_with('\n') {
        contents.to_string()
    } else {
        format!("{contents}\n")
    };
    format!("cat > {} << 'PROVISION_EOF'\n{body}PROVISION_EOF", quote(path))
}

pub fn read_file(path: &str) -> String {
    format!("cat {}", quote(path))
}

/// Recursive attribute-preserving copy. The trailing slash on the source
/// makes rsync copy directory contents rather than the directory itself.
pub fn rsync(source: &str, dest: &str, delete: bool) -> String {
    let source = format!("{}/", source.trim_end_matches('/'));
    if delete {
        format!("rsync -aAXH --delete {} {}", quote(&source), quote(dest))
    } else {
        format!("rsync -aAXH {} {}", quote(&source), quote(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_mount_commands() {
        assert_eq!(
            mount("/dev/datavg/datalv", "/mnt/bootstrap", &[]),
            "mount /dev/datavg/datalv /mnt/bootstrap"
        );
        assert_eq!(
            mount(
                "/dev/datavg/datalv",
                "/mnt/nix-stage",
                &["subvol=@nix".to_string(), "compress=zstd".to_string()]
            ),
            "mount -o subvol=@nix,compress=zstd /dev/datavg/datalv /mnt/nix-stage"
        );
        assert_eq!(umount("/mnt/bootstrap"), "umount /mnt/bootstrap");
    }

    #[test]
    fn rsync_normalizes_the_source_suffix() {
        assert_eq!(
            rsync("/nix", "/mnt/bootstrap/@nix", false),
            "rsync -aAXH /nix/ /mnt/bootstrap/@nix"
        );
        assert_eq!(
            rsync("/nix/", "/mnt/nix-stage", true),
            "rsync -aAXH --delete /nix/ /mnt/nix-stage"
        );
    }

    #[test]
    fn heredoc_write_embeds_contents_verbatim() {
        let command = write_file("/etc/nixos/storage.nix", "{ }\n");
        assert!(command.starts_with("cat > /etc/nixos/storage.nix << 'PROVISION_EOF'"));
        assert!(command.ends_with("PROVISION_EOF"));
        assert!(command.contains("{ }"));
    }
}
