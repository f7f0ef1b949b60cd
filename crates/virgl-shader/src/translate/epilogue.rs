//! Code run when a stage leaves `main()`: fragment fix-ups, user clip
//! planes, stream-output copies and the window-system y flip.

use virgl_core::pipe::{CompareFunc, ShaderType};

use super::Translator;
use crate::error::{Result, TranslateError};
use crate::glsl::ShaderReq;
use crate::tgsi::Semantic;

/// Matches the number of transform-feedback outputs gallium allows.
const MAX_SO_OUTPUTS: usize = 64;

const COMPONENTS: [char; 4] = ['x', 'y', 'z', 'w'];

fn alpha_op(func: CompareFunc) -> &'static str {
    match func {
        CompareFunc::Never => "false",
        CompareFunc::Less => "<",
        CompareFunc::Equal => "==",
        CompareFunc::Lequal => "<=",
        CompareFunc::Greater => ">",
        CompareFunc::Notequal => "!=",
        CompareFunc::Gequal => ">=",
        CompareFunc::Always => "true",
    }
}

impl Translator<'_> {
    fn output_at(&self, register: u32) -> Option<usize> {
        self.outputs.iter().position(|o| o.first == register)
    }

    pub(super) fn emit_color_select(&mut self) {
        if !self.key.color_two_side || self.color_in_mask & 0x3 == 0 {
            return;
        }
        for i in 0..2 {
            if self.color_in_mask & (1 << i) != 0 {
                self.main
                    .line(&format!("realcolor{i} = gl_FrontFacing ? ex_c{i} : ex_bc{i};"));
            }
        }
    }

    pub(super) fn emit_prescale(&mut self) {
        self.main
            .line("gl_Position.y = gl_Position.y * winsys_adjust_y;");
    }

    /// Decide which stream outputs need a dedicated `tfout` varying. Outputs
    /// that cover a whole plain register are captured under their own name.
    pub(super) fn prepare_so_movs(&mut self) {
        let key = self.key;
        let Some(so) = key.so_info.as_ref() else {
            return;
        };
        self.so_need_temp = vec![true; so.outputs.len()];
        for (i, out) in so.outputs.iter().enumerate() {
            if out.start_component != 0 || out.num_components != 4 {
                continue;
            }
            let Some(j) = self.output_at(out.register_index) else {
                continue;
            };
            if matches!(
                self.outputs[j].semantic,
                Semantic::ClipDist | Semantic::Position
            ) {
                continue;
            }
            self.outputs[j].stream = out.stream;
            if self.stage == ShaderType::Geometry && out.stream != 0 {
                self.reqs |= ShaderReq::GPU_SHADER5;
            }
            self.so_need_temp[i] = false;
        }
    }

    pub(super) fn emit_so_movs(&mut self) -> Result<()> {
        let key = self.key;
        let Some(so) = key.so_info.as_ref() else {
            return Ok(());
        };
        if so.outputs.len() >= MAX_SO_OUTPUTS {
            return Err(TranslateError::Overflow {
                what: "stream outputs",
                max: MAX_SO_OUTPUTS,
            });
        }

        self.so_names.clear();
        for (i, out) in so.outputs.iter().enumerate() {
            let mask: String = if out.start_component != 0 {
                let comps = (out.start_component..out.start_component + out.num_components)
                    .take_while(|&c| c < 4)
                    .map(|c| COMPONENTS[c as usize]);
                std::iter::once('.').chain(comps).collect()
            } else {
                String::new()
            };

            let need_temp = self.so_need_temp.get(i).copied().unwrap_or(true);
            let reg = self.output_at(out.register_index);
            let name = match reg {
                _ if need_temp => format!("tfout{i}"),
                None => String::new(),
                Some(j)
                    if self.outputs[j].semantic == Semantic::ClipVertex
                        && self.has_clipvertex =>
                {
                    self.has_clipvertex_so = true;
                    "clipv_tmp".to_string()
                }
                Some(j) => self.outputs[j].name.clone(),
            };
            self.so_names.push(name);

            let Some(j) = reg else {
                continue;
            };
            let output = &self.outputs[j];
            let outtype = match out.num_components {
                1 if output.is_int => "intBitsToFloat".to_string(),
                1 => "float".to_string(),
                n => format!("vec{n}"),
            };
            if output.semantic == Semantic::ClipDist {
                let sid = output.sid;
                self.main
                    .line(&format!("tfout{i} = {outtype}(clip_dist_temp[{sid}]{mask});"));
            } else if need_temp {
                let src = output.name.clone();
                self.main.line(&format!("tfout{i} = {outtype}({src}{mask});"));
            }
        }
        Ok(())
    }

    /// Copy the clip distance temporaries (or the user clip plane dot
    /// products) into the built-in arrays.
    pub(super) fn emit_clip_dist_movs(&mut self) {
        let prefix = if self.stage == ShaderType::TessCtrl {
            "gl_out[gl_InvocationID]."
        } else {
            ""
        };
        if self.num_clip_dist == 0 && self.key.clip_plane_enable {
            let pos = if self.has_clipvertex {
                "clipv_tmp"
            } else {
                "gl_Position"
            };
            for i in 0..8 {
                self.main.line(&format!(
                    "{prefix}gl_ClipDistance[{i}] = dot({pos}, clipp[{i}]);"
                ));
            }
            return;
        }

        let num_clip = self.props.num_clip_dist_prop;
        let num_cull = self.props.num_cull_dist_prop;
        let has_prop = num_clip + num_cull > 0;
        let ndists = if has_prop {
            num_clip + num_cull
        } else {
            self.num_clip_dist
        };
        for i in 0..ndists {
            let temp = if i < 4 { 0 } else { 1 };
            let comp = COMPONENTS[(i & 3) as usize];
            let is_cull = has_prop && i >= num_clip;
            let (kind, idx) = if is_cull {
                ("Cull", i - num_clip)
            } else {
                ("Clip", i)
            };
            self.main.line(&format!(
                "{prefix}gl_{kind}Distance[{idx}] = clip_dist_temp[{temp}].{comp};"
            ));
        }
    }

    fn emit_pstipple_pass(&mut self) {
        self.main.line(
            "stip_temp = texture(pstipple_sampler, vec2(gl_FragCoord.x / 32, gl_FragCoord.y / 32)).x;",
        );
        self.main.line("if (stip_temp > 0) {");
        self.main.line("\tdiscard;");
        self.main.line("}");
    }

    fn emit_alpha_test(&mut self) {
        let Some(first) = self.outputs.first() else {
            return;
        };
        // Only the stanza for colour buffer 0.
        if !self.write_all_cbufs && first.sid != 0 {
            return;
        }
        let func = self.key.alpha_test;
        let cmp = match func {
            CompareFunc::Never | CompareFunc::Always => alpha_op(func).to_string(),
            _ => format!(
                "fsout_c0.w {} {:.6}",
                alpha_op(func),
                self.key.alpha_ref_val
            ),
        };
        self.main.line(&format!("if (!({cmp})) {{"));
        self.main.line("\tdiscard;");
        self.main.line("}");
    }

    fn emit_cbuf_writes(&mut self) {
        let num_outputs = self.outputs.len() as u32;
        for i in num_outputs..self.cfg.max_draw_buffers {
            self.main.line(&format!("fsout_c{i} = fsout_c0;"));
        }
    }

    pub(super) fn fragment_exit(&mut self) {
        if self.key.pstipple_tex {
            self.emit_pstipple_pass();
        }
        if self.key.cbufs_are_a8_bitmask != 0 {
            self.main.line("fsout_c0.x = fsout_c0.w;");
        }
        if self.key.add_alpha_test {
            self.emit_alpha_test();
        }
        if self.write_all_cbufs {
            self.emit_cbuf_writes();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_operators() {
        assert_eq!(alpha_op(CompareFunc::Never), "false");
        assert_eq!(alpha_op(CompareFunc::Gequal), ">=");
        assert_eq!(alpha_op(CompareFunc::Always), "true");
    }
}
