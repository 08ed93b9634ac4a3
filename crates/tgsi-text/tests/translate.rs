use pretty_assertions::assert_eq;
use tgsi::full::FullToken;
use tgsi::test_utils::{build_program, simple_instruction};
use tgsi::token::{
    ExtSwizzle, Interpolate, Modulate, ProcessorType, RegisterFile, Saturate, Semantic, Swizzle,
    Texture,
};
use tgsi::{parse_all, DumpFlags, FullDeclaration, FullInstruction, Opcode, ParseContext, WriteMask};
use tgsi_text::{translate, translate_into, TranslateOptions};

const PASSTHROUGH: &str = "\
FRAG1.1
DCL IN[0], COLOR, LINEAR
DCL OUT[0], COLOR
MOV OUT[0], IN[0]
";

/// Exercises every operand form the syntax has.
const KITCHEN_SINK: &str = "\
FRAG1.1
DCL IN[0..1], GENERIC[3], PERSPECTIVE
DCL CONST[0..7]
DCL ADDR[0]
DCL TEMP[0..1]
DCL SAMP[0]
DCL OUT[0], COLOR
IMM FLT32 { 0.5, 1.0, -2.0, 0.25 }
ARL ADDR[0].x, IN[1].x
MAD_SAT TEMP[0]_2X.xy, -(|IN[0].yzxw|), CONST[ADDR[0].x+3], CONST[1][2].01xy
TEX TEMP[1], IN[0], SAMP[0], 2D
IF TEMP[1].x :6
MOV OUT[0], (1-(TEMP[0]))-0.5
ELSE :8
MOV OUT[0], 2*(-TEMP[1])
ENDIF
END
";

fn instructions(tokens: &[u32]) -> Vec<FullInstruction> {
    parse_all(tokens)
        .unwrap()
        .into_iter()
        .filter_map(|token| match token {
            FullToken::Instruction(insn) => Some(insn),
            _ => None,
        })
        .collect()
}

/// The dump without its banner lines, which is again valid input.
fn dump_body(tokens: &[u32]) -> String {
    let text = tgsi::dump(tokens, DumpFlags::empty()).unwrap();
    text.lines()
        .filter(|line| !line.starts_with("tgsi-dump"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn passthrough_program() {
    let tokens = translate(PASSTHROUGH, &TranslateOptions::default()).unwrap();

    let ctx = ParseContext::init(&tokens).unwrap();
    assert_eq!(ctx.full_header().processor.processor, ProcessorType::Fragment);

    let records = parse_all(&tokens).unwrap();
    assert_eq!(records.len(), 3);
    assert!(matches!(records[0], FullToken::Declaration(_)));
    assert!(matches!(records[1], FullToken::Declaration(_)));
    let FullToken::Instruction(insn) = &records[2] else {
        panic!("expected an instruction, got {:?}", records[2]);
    };
    assert_eq!(insn.instruction.opcode, Opcode::Mov);
    assert_eq!(insn.instruction.num_dst_regs, 1);
    assert_eq!(insn.instruction.num_src_regs, 1);
    assert_eq!(insn.dst[0].register.index, 0);
    assert_eq!(insn.src[0].register.index, 0);
}

#[test]
fn color_passthrough_without_interpolation() {
    let text = "FRAG1.1\nDCL IN[0], COLOR\nDCL OUT[0], COLOR\nMOV OUT[0], IN[0]\n";
    let tokens = translate(text, &TranslateOptions::default()).unwrap();

    let ctx = ParseContext::init(&tokens).unwrap();
    assert_eq!(ctx.full_header().processor.processor, ProcessorType::Fragment);

    let records = parse_all(&tokens).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records[..2] {
        let FullToken::Declaration(decl) = record else {
            panic!("expected a declaration, got {record:?}");
        };
        assert_eq!(decl.declaration.interpolate, Interpolate::Constant);
        assert_eq!(decl.semantic.map(|s| s.name), Some(Semantic::Color));
    }
    let insns = instructions(&tokens);
    assert_eq!(insns.len(), 1);
    assert_eq!(insns[0].instruction.opcode, Opcode::Mov);
    assert_eq!(insns[0].instruction.num_dst_regs, 1);
    assert_eq!(insns[0].instruction.num_src_regs, 1);
    assert_eq!(insns[0].dst[0].register.index, 0);
    assert_eq!(insns[0].src[0].register.index, 0);

    let body = dump_body(&tokens);
    for word in ["MOV", "OUT[0]", "IN[0]", "COLOR"] {
        assert!(body.contains(word), "{word} missing from\n{body}");
    }
}

#[test]
fn text_matches_builder_output() {
    let tokens = translate(PASSTHROUGH, &TranslateOptions::default()).unwrap();
    let expected = build_program(
        ProcessorType::Fragment,
        &[
            FullToken::Declaration(
                FullDeclaration::new(RegisterFile::Input, 0, 0)
                    .with_semantic(Semantic::Color, 0)
                    .with_interpolate(Interpolate::Linear),
            ),
            FullToken::Declaration(
                FullDeclaration::new(RegisterFile::Output, 0, 0).with_semantic(Semantic::Color, 0),
            ),
            FullToken::Instruction(simple_instruction(
                Opcode::Mov,
                &[(RegisterFile::Output, 0)],
                &[(RegisterFile::Input, 0)],
            )),
        ],
    );
    assert_eq!(tokens, expected);
}

#[test]
fn dump_mentions_what_the_source_says() {
    let tokens = translate(PASSTHROUGH, &TranslateOptions::default()).unwrap();
    assert_eq!(
        tgsi::dump(&tokens, DumpFlags::empty()).unwrap(),
        "tgsi-dump begin -----------------\n\
         FRAG1.1\n\
         DCL IN[0], COLOR, LINEAR\n\
         DCL OUT[0], COLOR, CONSTANT\n\
         0: MOV OUT[0], IN[0]\n\
         tgsi-dump end -------------------\n"
    );
}

#[test]
fn operand_forms() {
    let tokens = translate(KITCHEN_SINK, &TranslateOptions::default()).unwrap();
    let insns = instructions(&tokens);
    let opcodes: Vec<_> = insns.iter().map(|i| i.instruction.opcode).collect();
    assert_eq!(
        opcodes,
        [
            Opcode::Arl,
            Opcode::Mad,
            Opcode::Tex,
            Opcode::If,
            Opcode::Mov,
            Opcode::Else,
            Opcode::Mov,
            Opcode::EndIf,
            Opcode::End,
        ]
    );

    let arl = &insns[0];
    assert_eq!(arl.dst[0].register.write_mask, WriteMask::X);
    assert_eq!(arl.src[0].register.swizzle, [Swizzle::X; 4]);

    let mad = &insns[1];
    assert_eq!(mad.instruction.saturate, Saturate::ZeroOne);
    assert_eq!(mad.dst[0].register.write_mask, WriteMask::XY);
    assert_eq!(mad.dst[0].ext_modulate.modulate, Modulate::X2);

    let a = &mad.src[0];
    assert!(a.ext_mod.negate);
    assert!(a.ext_mod.absolute);
    assert!(!a.register.negate);
    assert_eq!(a.register.swizzle, [Swizzle::Y, Swizzle::Z, Swizzle::X, Swizzle::W]);

    let b = &mad.src[1];
    assert_eq!(b.register.file, RegisterFile::Constant);
    assert_eq!(b.register.index, 3);
    let address = b.indirect.unwrap();
    assert_eq!(address.file, RegisterFile::Address);
    assert_eq!(address.index, 0);
    assert_eq!(address.swizzle, [Swizzle::X; 4]);
    assert!(b.dimension.is_none());

    let c = &mad.src[2];
    assert_eq!(c.register.index, 2);
    let dim = c.dimension.unwrap();
    assert_eq!(dim.dimension.index, 1);
    assert!(dim.indirect.is_none());
    assert_eq!(c.register.swizzle, Swizzle::IDENTITY);
    assert_eq!(
        c.ext_swz.ext_swizzle,
        [ExtSwizzle::Zero, ExtSwizzle::One, ExtSwizzle::X, ExtSwizzle::Y]
    );

    assert_eq!(insns[2].ext_texture.texture, Texture::Tex2D);
    assert_eq!(insns[3].ext_label.label, 6);
    assert_eq!(insns[5].ext_label.label, 8);

    let biased = &insns[4].src[0];
    assert!(biased.ext_mod.bias);
    assert!(biased.ext_mod.complement);
    assert!(!biased.ext_mod.scale_2x);

    let scaled = &insns[6].src[0];
    assert!(scaled.ext_mod.scale_2x);
    assert!(scaled.register.negate);
}

#[test]
fn dump_output_translates_back_to_the_same_tokens() {
    let tokens = translate(KITCHEN_SINK, &TranslateOptions::default()).unwrap();
    let body = dump_body(&tokens);
    assert!(body.contains("1: MAD_SAT TEMP[0]_2X.xy, -(|IN[0].yzxw|), CONST[ADDR[0].x+3], CONST[1][2].01xy"));
    assert!(body.contains("4: MOV OUT[0], (1-(TEMP[0]))-.5"));
    assert!(body.contains("3: IF TEMP[1].xxxx :6"));

    let again = translate(&body, &TranslateOptions::default()).unwrap();
    assert_eq!(again, tokens);
}

#[test]
fn indirect_offsets_may_be_spaced_from_their_sign() {
    let program = |operand: &str| {
        format!("FRAG1.1\nDCL CONST[0..7]\nDCL ADDR[0]\nDCL OUT[0]\nMOV OUT[0], {operand}\n")
    };
    let tight = translate(&program("CONST[ADDR[0].x+3]"), &TranslateOptions::default()).unwrap();
    let spaced =
        translate(&program("CONST[ ADDR[0].x + 3 ]"), &TranslateOptions::default()).unwrap();
    assert_eq!(spaced, tight);

    let tokens = translate(
        &program("CONST[ADDR[0].y - 2]"),
        &TranslateOptions {
            sanity_check: false,
            ..Default::default()
        },
    )
    .unwrap();
    let src = &instructions(&tokens)[0].src[0];
    assert_eq!(src.register.index, -2);
    assert_eq!(src.indirect.unwrap().swizzle, [Swizzle::Y; 4]);
}

#[test]
fn bias_closer_may_put_the_parenthesis_last() {
    let a = translate(
        "FRAG1.1\nDCL IN[0]\nDCL OUT[0]\nMOV OUT[0], (IN[0])-0.5\n",
        &TranslateOptions::default(),
    )
    .unwrap();
    let b = translate(
        "FRAG1.1\nDCL IN[0]\nDCL OUT[0]\nMOV OUT[0], (IN[0] - .5)\n",
        &TranslateOptions::default(),
    )
    .unwrap();
    assert_eq!(a, b);
    assert!(instructions(&a)[0].src[0].ext_mod.bias);
}

#[test]
fn keywords_are_case_insensitive_and_comments_are_skipped() {
    let text = "\
; a vertex program
vert1.1 ; header
dcl in[0], position
dcl out[0], position
mov_satnv out[0].xy, in[0].wzyx ; swizzled copy
end
";
    let tokens = translate(text, &TranslateOptions::default()).unwrap();
    let ctx = ParseContext::init(&tokens).unwrap();
    assert_eq!(ctx.full_header().processor.processor, ProcessorType::Vertex);

    let insns = instructions(&tokens);
    assert_eq!(insns.len(), 2);
    assert_eq!(insns[0].instruction.saturate, Saturate::MinusPlusOne);
    assert_eq!(insns[0].dst[0].register.write_mask, WriteMask::XY);
    assert_eq!(
        insns[0].src[0].register.swizzle,
        [Swizzle::W, Swizzle::Z, Swizzle::Y, Swizzle::X]
    );
    assert_eq!(insns[1].instruction.opcode, Opcode::End);
}

#[test]
fn longer_mnemonics_are_not_cut_short() {
    let text = "\
GEOM1.1
DCL TEMP[0]
NRM4 TEMP[0], TEMP[0]
BGNLOOP2 :3
ENDLOOP2 :1
ENDIF
END
";
    let tokens = translate(text, &TranslateOptions::default()).unwrap();
    let opcodes: Vec<_> = instructions(&tokens)
        .iter()
        .map(|i| i.instruction.opcode)
        .collect();
    assert_eq!(
        opcodes,
        [Opcode::Nrm4, Opcode::BgnLoop2, Opcode::EndLoop2, Opcode::EndIf, Opcode::End]
    );
}

#[test]
fn declarations_with_ranges_masks_and_semantics() {
    let text = "\
VERT1.1
DCL IN[2..5].xz, GENERIC[7]
DCL TEMP[0..3], LINEAR
DCL OUT[1]
";
    let tokens = translate(
        text,
        &TranslateOptions {
            sanity_check: false,
            ..Default::default()
        },
    )
    .unwrap();
    let decls: Vec<_> = parse_all(&tokens)
        .unwrap()
        .into_iter()
        .filter_map(|token| match token {
            FullToken::Declaration(decl) => Some(decl),
            _ => None,
        })
        .collect();
    assert_eq!(decls.len(), 3);

    assert_eq!(decls[0].declaration.file, RegisterFile::Input);
    assert_eq!((decls[0].range.first, decls[0].range.last), (2, 5));
    assert_eq!(decls[0].declaration.usage_mask, WriteMask::X | WriteMask::Z);
    let semantic = decls[0].semantic.unwrap();
    assert_eq!((semantic.name, semantic.index), (Semantic::Generic, 7));

    assert!(decls[1].semantic.is_none());
    assert_eq!(decls[1].declaration.interpolate, Interpolate::Linear);
    assert_eq!((decls[1].range.first, decls[1].range.last), (0, 3));

    assert_eq!(decls[2].declaration.interpolate, Interpolate::Constant);
    assert_eq!(decls[2].declaration.usage_mask, WriteMask::XYZW);
}

#[test]
fn immediates_hold_four_floats() {
    let text = "FRAG1.1\nIMM FLT32 { 1, -0.5, 2.5e1, .25 }\n";
    let tokens = translate(text, &TranslateOptions::default()).unwrap();
    let records = parse_all(&tokens).unwrap();
    let FullToken::Immediate(imm) = &records[0] else {
        panic!("expected an immediate, got {:?}", records[0]);
    };
    assert_eq!(imm.data, vec![1.0, -0.5, 25.0, 0.25]);
}

#[test]
fn translate_into_reports_the_length() {
    let mut buf = [0u32; 64];
    let len = translate_into(PASSTHROUGH, &mut buf, true).unwrap();
    let tokens = translate(PASSTHROUGH, &TranslateOptions::default()).unwrap();
    assert_eq!(len, tokens.len());
    assert_eq!(&buf[..len], &tokens[..]);
}
