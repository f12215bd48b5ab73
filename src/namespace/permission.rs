use super::types::InodeKind;

/// Renders permission digits (e.g. `755`) the way `ls -l` does.
pub struct PermissionFormatter;

impl PermissionFormatter {
    /// `format(Directory, 755)` is `drwxr-xr-x`. Only the last three digits
    /// count; absent leading digits render as `---`.
    pub fn format(kind: InodeKind, bits: u32) -> String {
        let mut out = String::with_capacity(10);
        out.push(match kind {
            InodeKind::Directory => 'd',
            InodeKind::File => '-',
        });
        out.push_str(&Self::mode(bits));
        out
    }

    /// The nine `rwx` characters without the type prefix.
    pub fn mode(bits: u32) -> String {
        let bits = bits % 1000;
        [bits / 100, (bits / 10) % 10, bits % 10]
            .iter()
            .map(|&digit| triad(digit.min(7)))
            .collect()
    }
}

fn triad(digit: u32) -> String {
    let flag = |mask: u32, c: char| if digit & mask != 0 { c } else { '-' };
    [flag(4, 'r'), flag(2, 'w'), flag(1, 'x')].iter().collect()
}
